use std::sync::Arc;

use crate::common::rate_limit::RateLimiter;
use crate::config::Config;
use crate::task::{TaskQueue, TaskStore};

/// 注入到所有请求处理器的共享状态
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<TaskStore>,
    pub queue: TaskQueue,
    pub limiter: RateLimiter,
}
