use std::env;
use std::str::FromStr;

// 默认的生成参数，与上游 API 对齐
pub const DEFAULT_BASE_URL: &str = "https://api.dev.runwayml.com";
pub const DEFAULT_API_VERSION: &str = "2024-11-06";
pub const DEFAULT_RATIO: &str = "1280:768";
pub const DEFAULT_VIDEO_MODEL: &str = "gen3a_turbo";
pub const DEFAULT_IMAGE_MODEL: &str = "gen4_image";

/// 服务配置，启动时从环境变量读取，命令行参数可以覆盖
#[derive(Debug, Clone)]
pub struct Config {
    /// 上游 API 密钥，缺失时请求阶段返回配置错误
    pub api_key: Option<String>,
    pub base_url: String,
    pub api_version: String,
    /// HTTP 服务监听地址
    pub bind: String,
    /// 同时处于 pending/processing 的任务上限
    pub max_concurrent: usize,
    /// 限流：窗口内允许的请求数
    pub rate_limit: u32,
    /// 限流：窗口长度（秒）
    pub rate_window_secs: u64,
    /// 终态任务保留时长（秒）
    pub completed_ttl_secs: u64,
    pub failed_ttl_secs: u64,
    /// 上传图片大小上限（字节）
    pub max_image_bytes: usize,
    /// 轮询上游任务的间隔与次数上限
    pub upstream_poll_secs: u64,
    pub upstream_max_polls: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("RUNWAY_API_KEY").ok().filter(|v| !v.is_empty()),
            base_url: env_or("RUNWAY_BASE_URL", DEFAULT_BASE_URL.to_string()),
            api_version: env_or("RUNWAY_API_VERSION", DEFAULT_API_VERSION.to_string()),
            bind: env_or("VIDGEN_BIND", "127.0.0.1:3000".to_string()),
            max_concurrent: env_or("VIDGEN_MAX_CONCURRENT", 5),
            rate_limit: env_or("VIDGEN_RATE_LIMIT", 10),
            rate_window_secs: env_or("VIDGEN_RATE_WINDOW_SECS", 60),
            completed_ttl_secs: env_or("VIDGEN_COMPLETED_TTL_SECS", 3600),
            failed_ttl_secs: env_or("VIDGEN_FAILED_TTL_SECS", 900),
            max_image_bytes: env_or("VIDGEN_MAX_IMAGE_BYTES", 8 * 1024 * 1024),
            upstream_poll_secs: env_or("VIDGEN_UPSTREAM_POLL_SECS", 5),
            upstream_max_polls: env_or("VIDGEN_UPSTREAM_MAX_POLLS", 60),
        }
    }
}

// 读取环境变量，解析失败时退回默认值
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or(default),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_or_fallback() {
        // 未设置的变量应该使用默认值
        let value: usize = env_or("VIDGEN_TEST_NOT_SET", 5);
        assert_eq!(value, 5);
    }
}
