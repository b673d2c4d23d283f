use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::backend::GenerationBackend;
use super::error::ApiError;
use super::models::{GenerationPayload, TaskCreated, UpstreamTask};
use crate::config::{Config, DEFAULT_IMAGE_MODEL, DEFAULT_VIDEO_MODEL};
use crate::task::models::{GenerationJob, TaskKind};

const VERSION_HEADER: &str = "x-runway-version";

// 带默认请求头和认证信息的上游客户端
#[derive(Debug, Clone)]
pub struct RunwayClient {
    inner: Client,
    base_url: Url,
    api_key: Option<String>,
    ratio: String,
    poll_interval: Duration,
    max_polls: u32,
}

impl RunwayClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)?;

        let inner = ClientBuilder::new()
            .timeout(Duration::from_secs(60))
            .default_headers(Self::default_headers(&config.api_version))
            .build()?;

        Ok(Self {
            inner,
            base_url,
            api_key: config.api_key.clone(),
            ratio: crate::config::DEFAULT_RATIO.to_string(),
            poll_interval: Duration::from_secs(config.upstream_poll_secs),
            max_polls: config.upstream_max_polls,
        })
    }

    fn default_headers(api_version: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(api_version) {
            headers.insert(HeaderName::from_static(VERSION_HEADER), value);
        }
        headers
    }

    fn api_key(&self) -> Result<&str, ApiError> {
        self.api_key.as_deref().ok_or(ApiError::MissingCredential)
    }

    // 创建上游生成任务
    async fn create_task(&self, job: &GenerationJob) -> Result<TaskCreated, ApiError> {
        let (path, payload) = match job.kind {
            TaskKind::Image => (
                "/v1/text_to_image",
                GenerationPayload {
                    model: DEFAULT_IMAGE_MODEL.to_string(),
                    prompt_text: job.prompt.clone(),
                    prompt_image: None,
                    ratio: self.ratio.clone(),
                    duration: None,
                },
            ),
            TaskKind::Video => (
                "/v1/image_to_video",
                GenerationPayload {
                    model: DEFAULT_VIDEO_MODEL.to_string(),
                    prompt_text: job.prompt.clone(),
                    prompt_image: job.image_data_uri.clone(),
                    ratio: self.ratio.clone(),
                    duration: Some(5),
                },
            ),
        };

        self.post_json(path, &payload).await
    }

    // 查询上游任务状态
    async fn fetch_task(&self, id: &str) -> Result<UpstreamTask, ApiError> {
        self.get_json(&format!("/v1/tasks/{}", id)).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &impl Serialize,
    ) -> Result<T, ApiError> {
        let url = self.base_url.join(path)?;
        let resp = self
            .inner
            .post(url)
            .bearer_auth(self.api_key()?)
            .json(body)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.base_url.join(path)?;
        let resp = self
            .inner
            .get(url)
            .bearer_auth(self.api_key()?)
            .send()
            .await?;
        Self::handle_response(resp).await
    }

    // 统一处理上游响应，非 2xx 时提取错误信息
    async fn handle_response<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status();
        let raw = resp.bytes().await?;

        if !status.is_success() {
            let message = serde_json::from_slice::<Value>(&raw)
                .ok()
                .and_then(|v| {
                    v.get("error")
                        .and_then(|e| e.as_str())
                        .map(|s| s.to_string())
                })
                .unwrap_or_else(|| String::from_utf8_lossy(&raw).into_owned());
            warn!("上游返回错误: {} {}", status, message);
            return Err(ApiError::Api(status.as_u16(), message));
        }

        serde_json::from_slice::<T>(&raw)
            .map_err(|e| ApiError::InvalidResponse(format!("解析响应失败: {}", e)))
    }
}

#[async_trait]
impl GenerationBackend for RunwayClient {
    // 创建任务后轮询上游，直到拿到产物 URL 或失败
    async fn generate(
        &self,
        job: &GenerationJob,
        progress: &(dyn Fn(u8) + Send + Sync),
    ) -> Result<String, ApiError> {
        let created = self.create_task(job).await?;
        debug!("上游任务已创建: {} -> {}", job.task_id, created.id);

        let mut polls = 0u32;
        loop {
            tokio::time::sleep(self.poll_interval).await;
            polls += 1;

            let upstream = self.fetch_task(&created.id).await?;
            match upstream.status.as_str() {
                "SUCCEEDED" => {
                    let url = upstream
                        .output
                        .and_then(|urls| urls.into_iter().next())
                        .filter(|u| !u.is_empty())
                        .ok_or(ApiError::MissingOutput)?;
                    return Ok(url);
                }
                "FAILED" | "CANCELLED" => {
                    let reason = upstream
                        .failure
                        .unwrap_or_else(|| "上游未返回失败原因".to_string());
                    return Err(ApiError::GenerationFailed(reason));
                }
                _ => {
                    // 上游带进度时用上游的，否则按轮询次数粗略估算
                    let estimate = match upstream.progress {
                        Some(p) => (p * 100.0) as u8,
                        None => 10 + (polls * 2) as u8,
                    };
                    progress(estimate.min(95));
                }
            }

            if polls >= self.max_polls {
                warn!("上游任务超时: {}", created.id);
                return Err(ApiError::OperationTimeout);
            }
        }
    }
}
