use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("参数错误: {0}")]
    Validation(String),

    #[error("并发任务已达上限，请稍后重试")]
    Capacity,

    #[error("任务队列已关闭")]
    QueueClosed,
}

pub type Result<T> = std::result::Result<T, TaskError>;
