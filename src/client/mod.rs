use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use url::Url;

use crate::task::models::{Task, TaskKind};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("网络请求失败: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("无效的服务地址: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("读取图片失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("服务端返回错误 ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("响应解析失败: {0}")]
    InvalidResponse(String),

    #[error("等待结果超时")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// 命令行侧的轮询客户端
///
/// 提交任务后按固定间隔查询状态，直到终态或整体超时。
/// 超时只在本地放弃等待，服务端的任务会继续执行。
pub struct GenerateClient {
    http: Client,
    base: Url,
}

impl GenerateClient {
    pub fn new(server: &str) -> Result<Self> {
        Ok(Self {
            http: Client::builder().timeout(Duration::from_secs(30)).build()?,
            base: Url::parse(server)?,
        })
    }

    /// 提交任务，返回任务 ID；带图片时走 multipart 接口
    pub async fn submit(
        &self,
        kind: TaskKind,
        prompt: &str,
        image: Option<&Path>,
    ) -> Result<String> {
        match image {
            Some(path) => self.submit_with_image(prompt, path).await,
            None => self.submit_json(kind, prompt).await,
        }
    }

    async fn submit_json(&self, kind: TaskKind, prompt: &str) -> Result<String> {
        let url = self.base.join("/api/generate")?;
        let resp = self
            .http
            .post(url)
            .json(&json!({ "type": kind.as_str(), "prompt": prompt }))
            .send()
            .await?;
        let value = Self::handle_response(resp).await?;
        extract_task_id(&value)
    }

    async fn submit_with_image(&self, prompt: &str, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str(guess_mime(path))?;
        let form = reqwest::multipart::Form::new()
            .text("prompt", prompt.to_string())
            .part("image", part);

        let url = self.base.join("/api/generate-video")?;
        let resp = self.http.post(url).multipart(form).send().await?;
        let value = Self::handle_response(resp).await?;
        extract_task_id(&value)
    }

    pub async fn status(&self, task_id: &str) -> Result<Task> {
        let mut url = self.base.join("/api/generate")?;
        url.query_pairs_mut().append_pair("taskId", task_id);
        let resp = self.http.get(url).send().await?;
        let value = Self::handle_response(resp).await?;
        serde_json::from_value(value)
            .map_err(|e| ClientError::InvalidResponse(format!("解析任务记录失败: {}", e)))
    }

    /// 轮询任务状态直到终态，整体超时后本地放弃
    pub async fn wait(
        &self,
        task_id: &str,
        interval: Duration,
        timeout: Duration,
        mut on_progress: impl FnMut(&Task),
    ) -> Result<Task> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let task = self.status(task_id).await?;
            on_progress(&task);
            if task.status.is_terminal() {
                return Ok(task);
            }
            if tokio::time::Instant::now() + interval > deadline {
                return Err(ClientError::Timeout);
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn handle_response(resp: reqwest::Response) -> Result<Value> {
        let status = resp.status();
        let raw = resp.bytes().await?;
        let value: Value = serde_json::from_slice(&raw)
            .map_err(|_| ClientError::InvalidResponse(String::from_utf8_lossy(&raw).into_owned()))?;
        if !status.is_success() {
            let message = value
                .get("error")
                .and_then(|e| e.as_str())
                .unwrap_or("未知错误")
                .to_string();
            return Err(ClientError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(value)
    }
}

fn extract_task_id(value: &Value) -> Result<String> {
    value
        .get("taskId")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ClientError::InvalidResponse("响应缺少 taskId".to_string()))
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        // 其余一律按 png 处理，服务端只校验 image/ 前缀
        _ => "image/png",
    }
}
