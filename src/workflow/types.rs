//! 工作流类型定义
//!
//! 阶段、任务状态、任务元数据记录

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::storage;

pub type JobId = String;

/// 阶段类型（固定集合）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    /// 检索 + 生成长文报告
    Report,
    /// 报告 -> 结构化建议
    Suggest,
    /// 执行建议并通知
    Execute,
}

impl PhaseKind {
    pub const ALL: [PhaseKind; 3] = [PhaseKind::Report, PhaseKind::Suggest, PhaseKind::Execute];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Report => "report",
            PhaseKind::Suggest => "suggest",
            PhaseKind::Execute => "execute",
        }
    }

    /// 阶段输出的产物名
    pub fn artifact_name(&self) -> &'static str {
        match self {
            PhaseKind::Report => storage::REPORT,
            PhaseKind::Suggest => storage::SUGGESTIONS,
            PhaseKind::Execute => storage::EXECUTION_LOG,
        }
    }
}

impl fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PhaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PhaseKind::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown phase: {s}"))
    }
}

/// 任务状态
///
/// 序列化为 `pending` / `running_<phase>` / `completed` / `failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum JobStatus {
    /// 已提交，尚未开始执行
    Pending,
    /// 正在执行某个阶段
    Running(PhaseKind),
    /// 最后一个阶段完成且产物已写入
    Completed,
    /// 前置条件缺失或阶段出现未恢复的错误
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => f.write_str("pending"),
            JobStatus::Running(phase) => write!(f, "running_{}", phase),
            JobStatus::Completed => f.write_str("completed"),
            JobStatus::Failed => f.write_str("failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => other
                .strip_prefix("running_")
                .ok_or_else(|| format!("unknown status: {other}"))?
                .parse()
                .map(JobStatus::Running),
        }
    }
}

impl TryFrom<String> for JobStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JobStatus> for String {
    fn from(status: JobStatus) -> Self {
        status.to_string()
    }
}

/// 任务元数据（job.json）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub status: JobStatus,
    pub workflow: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    /// 失败原因（仅 failed 时）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    pub fn new(
        job_id: JobId,
        workflow: impl Into<String>,
        params: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            job_id,
            status: JobStatus::Pending,
            workflow: workflow.into(),
            params,
            created_at: now,
            updated_at: now,
            error: None,
        }
    }

    /// 是否超过陈旧阈值仍未结束（threshold 为 0 时关闭判定）
    pub fn is_stale(&self, threshold_secs: u64, now: chrono::DateTime<chrono::Utc>) -> bool {
        if threshold_secs == 0 || self.status.is_terminal() {
            return false;
        }
        let age = now.signed_duration_since(self.updated_at);
        age.num_seconds() >= i64::try_from(threshold_secs).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_forms() {
        assert_eq!(JobStatus::Pending.to_string(), "pending");
        assert_eq!(
            JobStatus::Running(PhaseKind::Suggest).to_string(),
            "running_suggest"
        );
        assert_eq!(
            "running_execute".parse::<JobStatus>(),
            Ok(JobStatus::Running(PhaseKind::Execute))
        );
        assert!("running_unknown".parse::<JobStatus>().is_err());
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn test_record_serializes_status_as_string() {
        let mut record = JobRecord::new("job-1".into(), "report_suggest_execute", Default::default());
        record.status = JobStatus::Running(PhaseKind::Report);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["status"], "running_report");
        assert!(value.get("error").is_none());

        let back: JobRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.status, JobStatus::Running(PhaseKind::Report));
    }

    #[test]
    fn test_stale_only_for_unfinished_jobs() {
        let mut record = JobRecord::new("job-1".into(), "report_suggest_execute", Default::default());
        let later = record.updated_at + chrono::Duration::seconds(120);

        record.status = JobStatus::Running(PhaseKind::Suggest);
        assert!(record.is_stale(60, later));
        assert!(!record.is_stale(0, later));
        assert!(!record.is_stale(600, later));

        record.status = JobStatus::Completed;
        assert!(!record.is_stale(60, later));
    }

    #[test]
    fn test_huge_threshold_never_stale() {
        let mut record = JobRecord::new("job-1".into(), "report_suggest_execute", Default::default());
        record.status = JobStatus::Running(PhaseKind::Report);
        assert!(!record.is_stale(u64::MAX, record.updated_at));
        assert!(!record.is_stale(u64::MAX, record.updated_at + chrono::Duration::days(365)));
    }
}
