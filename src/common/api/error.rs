use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("无效的接口地址: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("缺少 RUNWAY_API_KEY 配置")]
    MissingCredential,

    #[error("Runway API 错误 ({0}): {1}")]
    Api(u16, String),

    #[error("生成失败: {0}")]
    GenerationFailed(String),

    #[error("响应中缺少输出地址")]
    MissingOutput,

    #[error("等待上游任务超时")]
    OperationTimeout,
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidResponse(e.to_string())
    }
}
