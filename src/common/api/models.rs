use serde::{Deserialize, Serialize};

/// 创建生成任务的请求体
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationPayload {
    pub model: String,
    pub prompt_text: String,
    /// data URI 形式的首帧图片，仅 image_to_video 需要
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_image: Option<String>,
    /// 固定的输出尺寸，如 "1280:768"
    pub ratio: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskCreated {
    pub id: String,
}

/// 上游任务的标准返回格式
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamTask {
    pub id: String,
    /// PENDING / RUNNING / THROTTLED / SUCCEEDED / FAILED / CANCELLED
    pub status: String,
    #[serde(default)]
    pub output: Option<Vec<String>>,
    #[serde(default)]
    pub failure: Option<String>,
    /// 0.0 - 1.0，部分状态下缺失
    #[serde(default)]
    pub progress: Option<f64>,
}
