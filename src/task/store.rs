use std::sync::Arc;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::models::{Task, TaskStatus};

/// 进程内的任务存储
///
/// 启动时构造一次，通过共享状态注入各个请求处理器。
/// 没有持久化，进程重启后任务全部丢失。
#[derive(Debug)]
pub struct TaskStore {
    tasks: DashMap<String, Task>,
    completed_ttl: Duration,
    failed_ttl: Duration,
}

impl TaskStore {
    pub fn new(completed_ttl_secs: u64, failed_ttl_secs: u64) -> Self {
        Self {
            tasks: DashMap::new(),
            completed_ttl: Duration::seconds(completed_ttl_secs as i64),
            failed_ttl: Duration::seconds(failed_ttl_secs as i64),
        }
    }

    pub fn insert(&self, task: Task) {
        self.tasks.insert(task.id.clone(), task);
    }

    /// 查询任务，已过期的记录按不存在处理并顺手删掉
    pub fn get(&self, id: &str) -> Option<Task> {
        let task = self.tasks.get(id).map(|t| t.value().clone())?;
        if task.expires_at.is_some_and(|at| at <= Utc::now()) {
            self.tasks.remove(id);
            return None;
        }
        Some(task)
    }

    pub fn remove(&self, id: &str) {
        self.tasks.remove(id);
    }

    /// 统计 pending/processing 的任务数，用于并发准入
    pub fn active_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| !t.status.is_terminal())
            .count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// pending -> processing，其他状态不允许
    pub fn mark_processing(&self, id: &str) -> bool {
        match self.tasks.get_mut(id) {
            Some(mut task) if task.status == TaskStatus::Pending => {
                task.status = TaskStatus::Processing;
                true
            }
            _ => false,
        }
    }

    /// 进度只增不减，只在 processing 状态下更新
    pub fn set_progress(&self, id: &str, progress: u8) {
        if let Some(mut task) = self.tasks.get_mut(id) {
            if task.status == TaskStatus::Processing && progress > task.progress {
                task.progress = progress.min(100);
            }
        }
    }

    /// processing -> completed，记录产物地址并安排过期
    pub fn complete(&self, id: &str, result_url: String) -> bool {
        match self.tasks.get_mut(id) {
            Some(mut task) if task.status == TaskStatus::Processing => {
                task.status = TaskStatus::Completed;
                task.progress = 100;
                task.result = Some(result_url);
                task.expires_at = Some(Utc::now() + self.completed_ttl);
                true
            }
            _ => false,
        }
    }

    /// processing -> failed，错误信息写进记录
    pub fn fail(&self, id: &str, message: String) -> bool {
        match self.tasks.get_mut(id) {
            Some(mut task) if task.status == TaskStatus::Processing => {
                task.status = TaskStatus::Failed;
                task.error = Some(message);
                task.expires_at = Some(Utc::now() + self.failed_ttl);
                true
            }
            _ => false,
        }
    }

    /// 清理所有已过期的终态任务，返回清理数量
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.tasks.len();
        self.tasks
            .retain(|_, task| !task.expires_at.is_some_and(|at| at <= now));
        before - self.tasks.len()
    }
}

/// 周期性清理过期任务的后台循环
pub fn spawn_reaper(
    store: Arc<TaskStore>,
    interval_secs: u64,
    shutdown: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let swept = store.sweep_expired();
            if swept > 0 {
                debug!("清理过期任务: {}", swept);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::models::TaskKind;

    fn make_store() -> TaskStore {
        TaskStore::new(3600, 900)
    }

    fn make_task(id: &str) -> Task {
        Task::new(id.to_string(), TaskKind::Video)
    }

    #[test]
    fn test_status_transitions() {
        let store = make_store();
        store.insert(make_task("t1"));

        // pending 状态不允许直接完成
        assert!(!store.complete("t1", "http://example.com/a.mp4".to_string()));
        assert!(!store.fail("t1", "boom".to_string()));

        assert!(store.mark_processing("t1"));
        // 不允许重复进入 processing
        assert!(!store.mark_processing("t1"));

        assert!(store.complete("t1", "http://example.com/a.mp4".to_string()));
        let task = store.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.result.as_deref(), Some("http://example.com/a.mp4"));

        // 终态之后不再变化
        assert!(!store.fail("t1", "late".to_string()));
        assert!(!store.mark_processing("t1"));
    }

    #[test]
    fn test_progress_never_regresses() {
        let store = make_store();
        store.insert(make_task("t1"));
        store.mark_processing("t1");

        store.set_progress("t1", 40);
        store.set_progress("t1", 20);
        assert_eq!(store.get("t1").unwrap().progress, 40);

        store.set_progress("t1", 95);
        assert_eq!(store.get("t1").unwrap().progress, 95);
    }

    #[test]
    fn test_failed_task_keeps_error() {
        let store = make_store();
        store.insert(make_task("t1"));
        store.mark_processing("t1");
        assert!(store.fail("t1", "上游超时".to_string()));

        let task = store.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some("上游超时"));
        assert!(task.result.is_none());
    }

    #[test]
    fn test_active_count() {
        let store = make_store();
        store.insert(make_task("a"));
        store.insert(make_task("b"));
        store.insert(make_task("c"));
        assert_eq!(store.active_count(), 3);

        store.mark_processing("a");
        assert_eq!(store.active_count(), 3);

        store.complete("a", "http://example.com/x.png".to_string());
        assert_eq!(store.active_count(), 2);

        store.mark_processing("b");
        store.fail("b", "err".to_string());
        assert_eq!(store.active_count(), 1);
    }

    #[test]
    fn test_expired_task_is_gone_on_read() {
        // TTL 为 0，进入终态即过期
        let store = TaskStore::new(0, 0);
        store.insert(make_task("t1"));
        store.mark_processing("t1");
        store.complete("t1", "http://example.com/a.mp4".to_string());

        assert!(store.get("t1").is_none());
        // 懒清理应当已把记录删掉
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_expired() {
        let store = TaskStore::new(0, 3600);
        store.insert(make_task("done"));
        store.mark_processing("done");
        store.complete("done", "http://example.com/a.mp4".to_string());

        store.insert(make_task("running"));
        store.mark_processing("running");

        assert_eq!(store.sweep_expired(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("running").is_some());
    }

    #[test]
    fn test_unknown_id_is_none() {
        let store = make_store();
        assert!(store.get("no-such-task").is_none());
    }
}
