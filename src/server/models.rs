use serde::{Deserialize, Serialize};

use crate::task::models::{Task, TaskStatus};

/// POST /api/generate 的请求体，字段手动校验以便给出明确的错误信息
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateGenerationResponse {
    #[serde(rename = "taskId")]
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "taskId")]
    pub task_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreateVideoResponse {
    pub success: bool,
    #[serde(rename = "taskId")]
    pub task_id: String,
    pub status: TaskStatus,
    pub message: String,
}

/// GET /api/generate-video 的响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatusResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Task> for VideoStatusResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            progress: task.progress,
            video_url: task.result,
            error: task.error,
        }
    }
}
