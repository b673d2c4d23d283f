use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Image,
    Video,
}

impl TaskKind {
    /// 解析请求里的 type 字段
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// 对外可见的任务记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    // 进入终态后的过期时间，不对外暴露
    #[serde(skip)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: String, kind: TaskKind) -> Self {
        Self {
            id,
            kind,
            status: TaskStatus::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: Utc::now(),
            expires_at: None,
        }
    }
}

/// 队列里流转的任务载荷，提示词和图片不进公开记录
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub task_id: String,
    pub kind: TaskKind,
    pub prompt: String,
    pub image_data_uri: Option<String>,
}
