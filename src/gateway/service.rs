//! 任务网关：提交、状态查询、结果查询
//!
//! 提交时先解析工作流名（未知名称同步报错，不落盘），写入 pending 元数据后交给监管者调度，立即返回。
//! 查询只读：不会修改持久化状态；陈旧判定只体现在返回值里。

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::core::{JobError, StoreError};
use crate::gateway::JobSupervisor;
use crate::storage::{ArtifactStore, PRIMARY_RESULT};
use crate::workflow::{read_record, write_record, JobId, JobRecord, JobStatus, WorkflowKind};

/// 已完成但主结果缺失时的占位
pub const REPORT_NOT_FOUND: &str = "Report not found.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    /// 未完成时为空对象；完成时为 `{"report": ...}`
    pub result: Value,
}

pub struct JobGateway {
    store: Arc<dyn ArtifactStore>,
    supervisor: Arc<JobSupervisor>,
    stale_after_secs: u64,
}

impl JobGateway {
    pub fn new(store: Arc<dyn ArtifactStore>, supervisor: Arc<JobSupervisor>) -> Self {
        Self {
            store,
            supervisor,
            stale_after_secs: 0,
        }
    }

    /// 超过该秒数未更新的未结束任务标记为 stale（0 关闭）
    pub fn with_stale_after(mut self, secs: u64) -> Self {
        self.stale_after_secs = secs;
        self
    }

    pub async fn submit(&self, workflow: &str, params: Value) -> Result<SubmitResponse, JobError> {
        self.submit_with_handle(workflow, params)
            .await
            .map(|(response, _)| response)
    }

    /// 同 submit，额外返回后台任务句柄
    pub async fn submit_with_handle(
        &self,
        workflow: &str,
        params: Value,
    ) -> Result<(SubmitResponse, JoinHandle<JobStatus>), JobError> {
        let kind = WorkflowKind::from_str(workflow)?;
        let params: Map<String, Value> = match params {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(JobError::InvalidParams(format!(
                    "params must be an object, got {}",
                    json_type(&other)
                )))
            }
        };

        let job_id: JobId = uuid::Uuid::new_v4().to_string();
        let record = JobRecord::new(job_id.clone(), kind.name(), params.clone());
        write_record(self.store.as_ref(), &record).await?;
        tracing::info!(job_id = %job_id, workflow = %kind, "job submitted");

        let handle = self.supervisor.spawn(job_id.clone(), kind, params);
        Ok((
            SubmitResponse {
                job_id,
                status: JobStatus::Pending,
            },
            handle,
        ))
    }

    pub async fn get_status(&self, job_id: &str) -> Result<StatusResponse, JobError> {
        let record = read_record(self.store.as_ref(), job_id).await?;
        let stale = record.is_stale(self.stale_after_secs, chrono::Utc::now());
        if stale {
            tracing::warn!(job_id = %job_id, status = %record.status, "job looks stale");
        }
        Ok(StatusResponse {
            job_id: record.job_id,
            status: record.status,
            error: record.error,
            stale,
        })
    }

    pub async fn get_result(&self, job_id: &str) -> Result<ResultResponse, JobError> {
        let record = read_record(self.store.as_ref(), job_id).await?;
        let result = if record.status != JobStatus::Completed {
            Value::Object(Map::new())
        } else {
            let report = match self.store.get_text(job_id, PRIMARY_RESULT).await {
                Ok(text) => text,
                Err(StoreError::NotFound { .. }) => {
                    tracing::warn!(job_id = %job_id, "completed job has no primary result");
                    REPORT_NOT_FOUND.to_string()
                }
                Err(e) => return Err(e.into()),
            };
            serde_json::json!({ "report": report })
        };
        Ok(ResultResponse {
            job_id: record.job_id,
            status: record.status,
            result,
        })
    }

    /// 排空在途任务
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.supervisor.shutdown(timeout).await
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
