use async_trait::async_trait;

use super::error::ApiError;
use crate::task::models::GenerationJob;

/// 生成后端的统一入口，方便在测试中替换真实的上游调用
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// 执行一次完整的生成调用，成功时返回产物的 URL
    async fn generate(
        &self,
        job: &GenerationJob,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String, ApiError>;
}
