use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Query, State};
use axum::http::HeaderMap;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::error::ServerError;
use super::models::{
    CreateGenerationResponse, CreateVideoResponse, GenerateRequest, StatusQuery,
    VideoStatusResponse,
};
use super::state::AppState;
use crate::task::models::{Task, TaskKind, TaskStatus};

/// POST /api/generate：提交图片/视频生成任务
pub async fn create_generation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<CreateGenerationResponse>, ServerError> {
    enforce_rate_limit(&state, &headers)?;
    ensure_configured(&state)?;

    let kind_raw = body
        .kind
        .ok_or_else(|| ServerError::BadRequest("缺少 type 字段".to_string()))?;
    let kind = TaskKind::parse(&kind_raw)
        .ok_or_else(|| ServerError::BadRequest(format!("无效的任务类型: {}", kind_raw)))?;
    let prompt = body
        .prompt
        .ok_or_else(|| ServerError::BadRequest("缺少 prompt 字段".to_string()))?;

    let task_id = state.queue.submit(kind, &prompt, None)?;
    info!("创建生成任务: {}, 类型: {}", task_id, kind.as_str());

    Ok(Json(CreateGenerationResponse { task_id }))
}

/// GET /api/generate?taskId=xxx：返回完整任务记录
pub async fn generation_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Task>, ServerError> {
    let id = query
        .task_id
        .ok_or_else(|| ServerError::BadRequest("缺少 taskId 参数".to_string()))?;
    let task = state.store.get(&id).ok_or(ServerError::NotFound(id))?;
    Ok(Json(task))
}

/// POST /api/generate-video：上传首帧图片和提示词，创建视频生成任务
pub async fn create_video_generation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<CreateVideoResponse>, ServerError> {
    enforce_rate_limit(&state, &headers)?;
    ensure_configured(&state)?;

    let mut prompt: Option<String> = None;
    let mut image: Option<(Vec<u8>, String)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("表单解析失败: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "prompt" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("读取 prompt 失败: {}", e)))?;
                prompt = Some(text);
            }
            "image" => {
                let mime = field.content_type().unwrap_or("image/png").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("读取图片失败: {}", e)))?;
                image = Some((data.to_vec(), mime));
            }
            _ => {}
        }
    }

    let (data, mime) = image
        .ok_or_else(|| ServerError::BadRequest("缺少 image 文件".to_string()))?;
    if data.is_empty() {
        return Err(ServerError::BadRequest("图片内容为空".to_string()));
    }
    if !mime.starts_with("image/") {
        return Err(ServerError::BadRequest(format!(
            "image 必须是图片文件，收到: {}",
            mime
        )));
    }
    if data.len() > state.config.max_image_bytes {
        return Err(ServerError::PayloadTooLarge(format!(
            "图片过大，上限 {} 字节",
            state.config.max_image_bytes
        )));
    }
    let prompt = prompt
        .ok_or_else(|| ServerError::BadRequest("缺少 prompt 字段".to_string()))?;

    // 图片转成 data URI 随任务载荷传给上游
    let data_uri = format!("data:{};base64,{}", mime, STANDARD.encode(&data));
    let task_id = state.queue.submit(TaskKind::Video, &prompt, Some(data_uri))?;
    info!("创建视频生成任务: {}, 图片 {} 字节", task_id, data.len());

    Ok(Json(CreateVideoResponse {
        success: true,
        task_id,
        status: TaskStatus::Pending,
        message: "视频生成任务已创建".to_string(),
    }))
}

/// GET /api/generate-video?taskId=xxx
pub async fn video_generation_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<VideoStatusResponse>, ServerError> {
    let id = query
        .task_id
        .ok_or_else(|| ServerError::BadRequest("缺少 taskId 参数".to_string()))?;
    let task = state.store.get(&id).ok_or(ServerError::NotFound(id))?;
    Ok(Json(task.into()))
}

/// GET /api/health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "activeTasks": state.store.active_count(),
    }))
}

// 限流按客户端标识计数，优先取 x-forwarded-for 的第一跳
fn client_key(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

fn enforce_rate_limit(state: &AppState, headers: &HeaderMap) -> Result<(), ServerError> {
    let key = client_key(headers);
    let verdict = state.limiter.check(&key);
    if !verdict.allowed {
        warn!("限流触发: {}", key);
        return Err(ServerError::RateLimited);
    }
    Ok(())
}

// RUNWAY_API_KEY 缺失时直接拒绝，不创建任务
fn ensure_configured(state: &AppState) -> Result<(), ServerError> {
    if state.config.api_key.is_none() {
        return Err(ServerError::Configuration(
            "缺少 RUNWAY_API_KEY 配置".to_string(),
        ));
    }
    Ok(())
}
