//! 错误类型与降级原因
//!
//! JobError 决定任务走向：提交前的错误同步返回给调用方，执行中的错误一律落为 failed 状态。
//! DegradedReason 只用于日志：模型不可用、输出无法解析、通知失败都不影响任务终态。

use std::fmt;

use thiserror::Error;

use crate::workflow::{JobStatus, PhaseKind};

/// 产物存储错误
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Artifact not found: {job_id}/{name}")]
    NotFound { job_id: String, name: String },

    #[error("Invalid artifact key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// 任务生命周期中可能出现的错误
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Workflow '{0}' not found.")]
    UnknownWorkflow(String),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Illegal status transition {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("Phase {phase} expected {expected} input")]
    PhaseInput {
        phase: PhaseKind,
        expected: &'static str,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl JobError {
    /// 未知工作流或未知任务
    pub fn is_not_found(&self) -> bool {
        matches!(self, JobError::UnknownWorkflow(_) | JobError::NotFound(_))
    }

    /// 调用方给出的参数不可用
    pub fn is_bad_request(&self) -> bool {
        matches!(self, JobError::InvalidParams(_) | JobError::MissingParameter(_))
    }
}

/// 工具调用错误（ToolExecutor 统一转换）
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Tool execution failed: {0}")]
    Failed(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),
}

/// 降级原因：记录日志后继续执行，不改变任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradedReason {
    /// 模型不可用或生成失败，使用占位输出
    Generation,
    /// 模型输出无法解析为结构化数据
    MalformedModelOutput,
    /// 搜索工具失败，报告基于空检索结果生成
    Search,
    /// 尽力而为的通知失败
    Notification,
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DegradedReason::Generation => "degraded_generation",
            DegradedReason::MalformedModelOutput => "malformed_model_output",
            DegradedReason::Search => "search_failure",
            DegradedReason::Notification => "notification_failure",
        };
        f.write_str(s)
    }
}

/// 配置错误：启动时发现，直接终止
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Workflow {workflow} references unregistered phase {phase}")]
    UnregisteredPhase { workflow: String, phase: PhaseKind },

    #[error("Required tool not registered: {0}")]
    MissingTool(String),

    #[error("Unsupported LLM provider: {0}")]
    UnknownProvider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(JobError::UnknownWorkflow("x".into()).is_not_found());
        assert!(JobError::NotFound("x".into()).is_not_found());
        assert!(JobError::MissingParameter("query".into()).is_bad_request());
        assert!(JobError::InvalidParams("[]".into()).is_bad_request());
        let internal = JobError::Internal("boom".into());
        assert!(!internal.is_not_found() && !internal.is_bad_request());
    }

    #[test]
    fn test_unknown_workflow_message() {
        let err = JobError::UnknownWorkflow("invalid_workflow".into());
        assert_eq!(err.to_string(), "Workflow 'invalid_workflow' not found.");
    }
}
