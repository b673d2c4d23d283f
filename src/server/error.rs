use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::task::error::TaskError;

/// 请求处理过程中的所有错误
///
/// 实现了 IntoResponse，处理器直接用 `?` 往外抛即可，
/// 统一转成 `{"error": "..."}` 的 JSON 响应。
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("请求过于频繁，请稍后重试")]
    RateLimited,

    #[error("并发任务已达上限，请稍后重试")]
    Capacity,

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("任务不存在或已过期: {0}")]
    NotFound(String),

    #[error("服务配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<TaskError> for ServerError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::Validation(msg) => Self::BadRequest(msg),
            TaskError::Capacity => Self::Capacity,
            TaskError::QueueClosed => Self::Internal("任务队列已关闭".to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Self::RateLimited => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Self::Capacity => (StatusCode::TOO_MANY_REQUESTS, self.to_string()),
            Self::PayloadTooLarge(m) => (StatusCode::PAYLOAD_TOO_LARGE, m.clone()),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            Self::Configuration(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            // 内部错误只记日志，不把细节透给客户端
            Self::Internal(m) => {
                error!("内部错误: {}", m);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "服务器内部错误".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
