use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::error::{Result, TaskError};
use super::models::{GenerationJob, Task, TaskKind};
use super::store::TaskStore;
use crate::common::api::backend::GenerationBackend;

/// 提示词长度上限（字符数）
pub const MAX_PROMPT_CHARS: usize = 1000;

/// 任务准入和后台处理的入口
///
/// 准入校验通过后任务进入有界通道，由固定数量的 worker 消费，
/// 并发上限在这里统一控制，而不是各处自己计数。
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::Sender<GenerationJob>,
    store: Arc<TaskStore>,
    max_active: usize,
}

impl TaskQueue {
    /// 启动 worker 池并返回队列句柄
    pub fn start(
        store: Arc<TaskStore>,
        backend: Arc<dyn GenerationBackend>,
        max_active: usize,
        shutdown: CancellationToken,
    ) -> Self {
        let max_active = max_active.max(1);
        let (tx, rx) = mpsc::channel::<GenerationJob>(max_active);
        let rx = Arc::new(Mutex::new(rx));

        for worker_id in 0..max_active {
            let rx = Arc::clone(&rx);
            let store = Arc::clone(&store);
            let backend = Arc::clone(&backend);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                worker_loop(worker_id, rx, store, backend, shutdown).await;
            });
        }

        Self {
            tx,
            store,
            max_active,
        }
    }

    /// 校验请求并创建 pending 任务，立即返回任务 ID
    pub fn submit(
        &self,
        kind: TaskKind,
        prompt: &str,
        image_data_uri: Option<String>,
    ) -> Result<String> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TaskError::Validation("提示词不能为空".to_string()));
        }
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(TaskError::Validation(format!(
                "提示词过长，最多 {} 个字符",
                MAX_PROMPT_CHARS
            )));
        }

        // 准入上限：pending + processing 不超过并发数
        if self.store.active_count() >= self.max_active {
            return Err(TaskError::Capacity);
        }

        let task_id = uuid::Uuid::new_v4().to_string();
        self.store.insert(Task::new(task_id.clone(), kind));

        let job = GenerationJob {
            task_id: task_id.clone(),
            kind,
            prompt: prompt.to_string(),
            image_data_uri,
        };

        // 通道满或关闭时回收刚插入的记录，避免留下孤儿任务
        match self.tx.try_send(job) {
            Ok(()) => Ok(task_id),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.store.remove(&task_id);
                Err(TaskError::Capacity)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.store.remove(&task_id);
                Err(TaskError::QueueClosed)
            }
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<GenerationJob>>>,
    store: Arc<TaskStore>,
    backend: Arc<dyn GenerationBackend>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            maybe = async { rx.lock().await.recv().await } => match maybe {
                Some(job) => job,
                None => break,
            },
        };
        process(&store, backend.as_ref(), job).await;
    }
    info!("worker {} 退出", worker_id);
}

// 处理单个任务：标记 processing，调用上游，把结果写回记录。
// 上游错误只进任务记录，不向任何调用方抛出。
async fn process(store: &Arc<TaskStore>, backend: &dyn GenerationBackend, job: GenerationJob) {
    if !store.mark_processing(&job.task_id) {
        warn!("任务状态异常，跳过处理: {}", job.task_id);
        return;
    }
    store.set_progress(&job.task_id, 10);
    info!("开始处理生成任务: {}, 类型: {:?}", job.task_id, job.kind);

    let progress_store = Arc::clone(store);
    let progress_id = job.task_id.clone();
    let on_progress = move |p: u8| progress_store.set_progress(&progress_id, p);

    match backend.generate(&job, &on_progress).await {
        Ok(url) => {
            store.complete(&job.task_id, url);
            info!("✅ 生成任务完成: {}", job.task_id);
        }
        Err(e) => {
            store.fail(&job.task_id, e.to_string());
            warn!("生成任务失败: {}, 原因: {}", job.task_id, e);
        }
    }
}
