use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AI图片/视频生成网关
#[derive(Parser, Debug)]
#[command(name = "vidgen")]
#[command(version = "1.0")]
#[command(about = "一个简单的AI图片/视频生成网关服务", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 启动HTTP服务
    Serve {
        /// 监听地址 (缺省时读取 VIDGEN_BIND)
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,

        /// 并发任务上限
        #[arg(long, value_name = "N")]
        max_concurrent: Option<usize>,

        /// 限流窗口内允许的请求数
        #[arg(long, value_name = "N")]
        rate_limit: Option<u32>,

        /// 限流窗口长度（秒）
        #[arg(long, value_name = "SECONDS")]
        rate_window: Option<u64>,
    },

    /// 提交生成任务并轮询等待结果
    Submit {
        /// 服务地址
        #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:3000")]
        server: String,

        /// 任务类型
        #[arg(long = "type", value_name = "TYPE", default_value = "video")]
        #[arg(help = "任务类型: image 或 video")]
        kind: String,

        /// 提示词
        #[arg(long, value_name = "TEXT")]
        prompt: String,

        /// 首帧图片路径 (可选，视频任务使用)
        #[arg(long, value_name = "FILE")]
        #[arg(value_hint = clap::ValueHint::FilePath)]
        image: Option<PathBuf>,

        /// 整体等待超时（秒）
        #[arg(long, value_name = "SECONDS", default_value_t = 300)]
        timeout: u64,

        /// 轮询间隔（秒）
        #[arg(long, value_name = "SECONDS", default_value_t = 1)]
        interval: u64,
    },
}
