use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use video_generator::cli::{Cli, Commands};
use video_generator::client::{ClientError, GenerateClient};
use video_generator::common::api::client::RunwayClient;
use video_generator::common::rate_limit::RateLimiter;
use video_generator::config::Config;
use video_generator::server::{AppState, routes};
use video_generator::task::models::{TaskKind, TaskStatus};
use video_generator::task::store::spawn_reaper;
use video_generator::task::{TaskQueue, TaskStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    let filter = tracing_subscriber::EnvFilter::try_from_env("VIDGEN_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            bind,
            max_concurrent,
            rate_limit,
            rate_window,
        } => run_server(bind, max_concurrent, rate_limit, rate_window).await,
        Commands::Submit {
            server,
            kind,
            prompt,
            image,
            timeout,
            interval,
        } => run_submit(server, kind, prompt, image, timeout, interval).await,
    }
}

async fn run_server(
    bind: Option<String>,
    max_concurrent: Option<usize>,
    rate_limit: Option<u32>,
    rate_window: Option<u64>,
) -> anyhow::Result<()> {
    // 环境变量打底，命令行参数覆盖
    let mut config = Config::from_env();
    if let Some(bind) = bind {
        config.bind = bind;
    }
    if let Some(n) = max_concurrent {
        config.max_concurrent = n;
    }
    if let Some(n) = rate_limit {
        config.rate_limit = n;
    }
    if let Some(n) = rate_window {
        config.rate_window_secs = n;
    }

    if config.api_key.is_none() {
        warn!("未设置 RUNWAY_API_KEY，生成请求将返回配置错误");
    }

    let config = Arc::new(config);
    let store = Arc::new(TaskStore::new(
        config.completed_ttl_secs,
        config.failed_ttl_secs,
    ));
    let backend = Arc::new(RunwayClient::new(&config)?);

    let shutdown = CancellationToken::new();
    let queue = TaskQueue::start(
        Arc::clone(&store),
        backend,
        config.max_concurrent,
        shutdown.clone(),
    );
    let _reaper = spawn_reaper(Arc::clone(&store), 60, shutdown.clone());

    let state = Arc::new(AppState {
        config: Arc::clone(&config),
        store,
        queue,
        limiter: RateLimiter::new(config.rate_limit, config.rate_window_secs),
    });

    let app = routes::build(state);
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("🚀 HTTP服务已启动: {}", config.bind);
    info!(
        "并发上限: {}, 限流: {} 次 / {} 秒",
        config.max_concurrent, config.rate_limit, config.rate_window_secs
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 通知 worker 和清理循环退出
    shutdown.cancel();
    info!("服务已停止");
    Ok(())
}

async fn run_submit(
    server: String,
    kind: String,
    prompt: String,
    image: Option<PathBuf>,
    timeout_secs: u64,
    interval_secs: u64,
) -> anyhow::Result<()> {
    let kind = TaskKind::parse(&kind)
        .ok_or_else(|| anyhow::anyhow!("无效的任务类型: {}，支持 image / video", kind))?;

    let client = GenerateClient::new(&server)?;
    println!("{} {}", "▶".cyan().bold(), "提交生成任务...".bold());
    let task_id = client.submit(kind, &prompt, image.as_deref()).await?;
    println!("{} 任务已创建: {}", "✓".green().bold(), task_id);

    // 进度条跟随服务端上报的任务进度
    let pb = indicatif::ProgressBar::new(100);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}%")
            .unwrap()
            .progress_chars("#>-"),
    );

    let result = client
        .wait(
            &task_id,
            Duration::from_secs(interval_secs),
            Duration::from_secs(timeout_secs),
            |task| pb.set_position(task.progress as u64),
        )
        .await;

    match result {
        Ok(task) if task.status == TaskStatus::Completed => {
            pb.finish_and_clear();
            println!(
                "{} {}",
                "🎉 生成完成！".green().bold(),
                task.result.unwrap_or_default()
            );
            Ok(())
        }
        Ok(task) => {
            pb.abandon();
            let reason = task.error.unwrap_or_else(|| "未知原因".to_string());
            println!("{} {}", "✗".red().bold(), format!("生成失败: {}", reason).red());
            Err(anyhow::anyhow!("生成失败: {}", reason))
        }
        Err(ClientError::Timeout) => {
            pb.abandon();
            // 本地放弃等待不会取消服务端任务
            println!(
                "{} {}",
                "⚠".yellow().bold(),
                "等待超时，任务仍在服务端继续执行".yellow()
            );
            Err(anyhow::anyhow!("等待结果超时"))
        }
        Err(e) => {
            pb.abandon();
            Err(e.into())
        }
    }
}

/// 等待 SIGINT (Ctrl-C) 或 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("安装 Ctrl-C 信号处理失败: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!("安装 SIGTERM 信号处理失败: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("收到退出信号，开始优雅关闭");
}
