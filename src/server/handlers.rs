use super::telegram_update::callback_from_update;
use super::AppState;
use crate::core::Outcome;
use crate::domain::model::{ChapterItem, Decision, DocumentSummary, ReviewStage};
use crate::utils::error::{ErrorCategory, FlowError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use teloxide::types::Update;

/// 以 `{"success": false, "error": ...}` 回應的錯誤
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: &FlowError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(error: FlowError) -> Self {
        tracing::error!(
            category = ?error.category(),
            severity = ?error.severity(),
            "❌ Request failed: {}",
            error
        );
        match error.category() {
            ErrorCategory::Protocol | ErrorCategory::Input => Self::bad_request(error.to_string()),
            _ => Self::internal(&error),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "success": false, "error": self.message })),
        )
            .into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::warn!("⚠️ Rejected request body: {}", rejection.body_text());
        Self::bad_request(rejection.body_text())
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

/// Telegram webhook：只處理按鈕回呼
///
/// 流程錯誤回 500，讓平台重送同一個 update；重送時狀態欄保證不會重複套用。
/// 無法解析的 update 直接確認，重送也不會成功。
pub async fn telegram_webhook(
    State(state): State<AppState>,
    payload: std::result::Result<Json<Update>, JsonRejection>,
) -> ApiResult<WebhookResponse> {
    let ignored = Json(WebhookResponse {
        success: true,
        outcome: None,
    });
    let update = match payload {
        Ok(Json(update)) => update,
        Err(rejection) => {
            tracing::warn!("⚠️ Ignoring unreadable Telegram update: {}", rejection.body_text());
            return Ok(ignored);
        }
    };

    let update_id = update.id;
    let Some(query) = callback_from_update(update) else {
        tracing::debug!(update_id = ?update_id, "Ignoring non-callback update");
        return Ok(ignored);
    };

    match state.engine.handle_callback(&query).await {
        Ok(outcome) => Ok(Json(WebhookResponse {
            success: true,
            outcome: Some(outcome),
        })),
        Err(e) => {
            tracing::error!(
                update_id = ?update_id,
                retryable = e.is_retryable(),
                "❌ Callback failed: {}",
                e
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            Err(ApiError::internal(&e))
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub document_id: Option<String>,
    pub chapter_index: u32,
    pub stage: String,
    pub action: String,
}

#[derive(Debug, Serialize)]
pub struct ApproveResponse {
    pub success: bool,
    pub message: &'static str,
    pub outcome: Outcome,
}

/// 不經聊天平台的人工核可
pub async fn approve(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ApproveRequest>, JsonRejection>,
) -> ApiResult<ApproveResponse> {
    let Json(request) = payload?;
    let stage: ReviewStage = request.stage.parse().map_err(ApiError::bad_request)?;
    let decision: Decision = request.action.parse().map_err(ApiError::bad_request)?;
    let document_id = request
        .document_id
        .filter(|id| !id.trim().is_empty())
        .or_else(|| state.default_document.clone())
        .ok_or_else(|| ApiError::bad_request("document_id is required"))?;

    let outcome = state
        .engine
        .decide(&document_id, request.chapter_index, stage, decision)
        .await?;

    Ok(Json(ApproveResponse {
        success: !matches!(outcome, Outcome::Invalid { .. } | Outcome::RowMissing),
        message: outcome.acknowledgement(),
        outcome,
    }))
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

pub async fn create_project(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreateProjectRequest>, JsonRejection>,
) -> std::result::Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let Json(request) = payload?;
    if request.name.trim().is_empty() {
        return Err(ApiError::bad_request("Project name is required"));
    }
    let document_id = state.intake.create_project(&request.name).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "document_id": document_id })),
    ))
}

#[derive(Debug, Serialize)]
pub struct ProjectList {
    pub success: bool,
    pub projects: Vec<DocumentSummary>,
}

pub async fn list_projects(State(state): State<AppState>) -> ApiResult<ProjectList> {
    let projects = state.intake.list_projects().await?;
    Ok(Json(ProjectList {
        success: true,
        projects,
    }))
}

#[derive(Debug, Serialize)]
pub struct ChapterList {
    pub success: bool,
    pub document_id: String,
    pub chapters: Vec<ChapterItem>,
}

pub async fn list_chapters(
    State(state): State<AppState>,
    Path(document_id): Path<String>,
) -> ApiResult<ChapterList> {
    let chapters = state.intake.list_chapters(&document_id).await?;
    Ok(Json(ChapterList {
        success: true,
        document_id,
        chapters,
    }))
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "store": state.engine.store().backend_name(),
        "transformer": state.engine.transformer_name(),
        "notifier": state.engine.notifier().name(),
        "default_document": state.default_document.is_some(),
    }))
}
