use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use video_generator::client::{ClientError, GenerateClient};
use video_generator::common::api::backend::GenerationBackend;
use video_generator::common::api::error::ApiError;
use video_generator::common::rate_limit::RateLimiter;
use video_generator::config::Config;
use video_generator::server::{AppState, routes};
use video_generator::task::models::{GenerationJob, TaskKind, TaskStatus};
use video_generator::task::{TaskQueue, TaskStore};

struct InstantBackend {
    url: String,
}

#[async_trait]
impl GenerationBackend for InstantBackend {
    async fn generate(
        &self,
        _job: &GenerationJob,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String, ApiError> {
        progress(80);
        Ok(self.url.clone())
    }
}

// 永远不返回的假后端，用来验证客户端超时
struct NeverBackend;

#[async_trait]
impl GenerationBackend for NeverBackend {
    async fn generate(
        &self,
        _job: &GenerationJob,
        _progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String, ApiError> {
        std::future::pending::<()>().await;
        Ok(String::new())
    }
}

// 在随机端口上启动完整服务，返回基地址
async fn spawn_server(backend: Arc<dyn GenerationBackend>) -> String {
    let config = Arc::new(Config {
        api_key: Some("test-key".to_string()),
        base_url: "https://api.dev.runwayml.com".to_string(),
        api_version: "2024-11-06".to_string(),
        bind: "127.0.0.1:0".to_string(),
        max_concurrent: 5,
        rate_limit: 100,
        rate_window_secs: 60,
        completed_ttl_secs: 3600,
        failed_ttl_secs: 900,
        max_image_bytes: 1024 * 1024,
        upstream_poll_secs: 1,
        upstream_max_polls: 3,
    });
    let store = Arc::new(TaskStore::new(
        config.completed_ttl_secs,
        config.failed_ttl_secs,
    ));
    let queue = TaskQueue::start(
        Arc::clone(&store),
        backend,
        config.max_concurrent,
        CancellationToken::new(),
    );
    let limiter = RateLimiter::new(config.rate_limit, config.rate_window_secs);
    let state = Arc::new(AppState {
        config,
        store,
        queue,
        limiter,
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::build(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_submit_and_poll_until_completed() {
    let base = spawn_server(Arc::new(InstantBackend {
        url: "http://example.com/cat.mp4".to_string(),
    }))
    .await;

    let client = GenerateClient::new(&base).unwrap();
    let task_id = client
        .submit(TaskKind::Video, "a cat dancing", None)
        .await
        .expect("提交应当成功");

    let mut seen_progress = Vec::new();
    let task = client
        .wait(
            &task_id,
            Duration::from_millis(50),
            Duration::from_secs(5),
            |t| seen_progress.push(t.progress),
        )
        .await
        .expect("轮询应当拿到终态");

    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.as_deref(), Some("http://example.com/cat.mp4"));
    // 进度不回退
    assert!(seen_progress.windows(2).all(|w| w[0] <= w[1]));
    println!("✅ 轮询完成: {:?}", task);
}

#[tokio::test]
async fn test_submit_with_image_file() {
    let base = spawn_server(Arc::new(InstantBackend {
        url: "http://example.com/cat.mp4".to_string(),
    }))
    .await;

    // 准备一个临时图片文件
    let image_path = std::env::temp_dir().join(format!("vidgen-test-{}.png", uuid::Uuid::new_v4()));
    tokio::fs::write(&image_path, b"fake-png-bytes").await.unwrap();

    let client = GenerateClient::new(&base).unwrap();
    let task_id = client
        .submit(TaskKind::Video, "a cat dancing", Some(&image_path))
        .await
        .expect("带图片提交应当成功");

    let task = client
        .wait(
            &task_id,
            Duration::from_millis(50),
            Duration::from_secs(5),
            |_| {},
        )
        .await
        .unwrap();
    assert_eq!(task.status, TaskStatus::Completed);

    tokio::fs::remove_file(&image_path).await.ok();
}

#[tokio::test]
async fn test_wait_times_out_locally() {
    let base = spawn_server(Arc::new(NeverBackend)).await;

    let client = GenerateClient::new(&base).unwrap();
    let task_id = client
        .submit(TaskKind::Video, "never finishes", None)
        .await
        .unwrap();

    let result = client
        .wait(
            &task_id,
            Duration::from_millis(100),
            Duration::from_millis(400),
            |_| {},
        )
        .await;
    assert!(matches!(result, Err(ClientError::Timeout)));

    // 客户端放弃后任务在服务端仍然存在
    let task = client.status(&task_id).await.unwrap();
    assert!(!task.status.is_terminal());
}
