//! HTTP 接口（axum）
//!
//! - POST /submit          提交任务
//! - GET  /status/:job_id  查询状态
//! - GET  /results/:job_id 查询结果
//! - GET  /               存活提示
//! - GET  /health          健康检查
//!
//! 错误体统一为 `{"detail": "..."}`。

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::core::JobError;
use crate::gateway::{JobGateway, ResultResponse, StatusResponse, SubmitResponse};

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub workflow: String,
    #[serde(default)]
    pub params: Value,
}

/// 接口错误：状态码 + detail
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        let status = if err.is_not_found() {
            StatusCode::NOT_FOUND
        } else if err.is_bad_request() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            tracing::error!(error = %err, "request failed");
        }
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "detail": self.detail }))).into_response()
    }
}

pub fn router(gateway: Arc<JobGateway>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(|| async { "OK" }))
        .route("/submit", post(submit))
        .route("/status/:job_id", get(status))
        .route("/results/:job_id", get(results))
        .with_state(gateway)
}

pub async fn root() -> Json<Value> {
    Json(serde_json::json!({ "message": "HPC Assistant Server is running." }))
}

pub async fn submit(
    State(gateway): State<Arc<JobGateway>>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    Ok(Json(gateway.submit(&req.workflow, req.params).await?))
}

pub async fn status(
    State(gateway): State<Arc<JobGateway>>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    Ok(Json(gateway.get_status(&job_id).await?))
}

pub async fn results(
    State(gateway): State<Arc<JobGateway>>,
    Path(job_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    Ok(Json(gateway.get_result(&job_id).await?))
}
