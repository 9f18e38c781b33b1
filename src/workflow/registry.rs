//! 工作流注册表
//!
//! 工作流是封闭集合：名称经 FromStr 解析为 WorkflowKind，未知名称在提交时同步报错。
//! 启动时用 validate 检查每个工作流引用的阶段都已注册。

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::core::{ConfigError, JobError};
use crate::phases::PhaseSet;
use crate::storage::Artifact;
use crate::workflow::{JobStatus, PhaseKind};

/// 已知工作流
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    /// 检索报告 → 结构化建议 → 执行与通知
    ReportSuggestExecute,
}

impl WorkflowKind {
    pub const ALL: [WorkflowKind; 1] = [WorkflowKind::ReportSuggestExecute];

    pub fn name(&self) -> &'static str {
        match self {
            WorkflowKind::ReportSuggestExecute => "report_suggest_execute",
        }
    }

    /// 有序阶段列表
    pub fn phases(&self) -> &'static [PhaseKind] {
        match self {
            WorkflowKind::ReportSuggestExecute => &PhaseKind::ALL,
        }
    }

    pub fn first_phase(&self) -> PhaseKind {
        self.phases()[0]
    }

    pub fn last_phase(&self) -> PhaseKind {
        self.phases()[self.phases().len() - 1]
    }

    /// 校验前置参数并构造第一个阶段的输入
    pub fn initial_input(&self, params: &Map<String, Value>) -> Result<Artifact, JobError> {
        match self {
            WorkflowKind::ReportSuggestExecute => {
                let query = params
                    .get("query")
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|q| !q.is_empty())
                    .ok_or_else(|| JobError::MissingParameter("query".to_string()))?;
                Ok(Artifact::Text(query.to_string()))
            }
        }
    }

    /// 状态迁移是否合法：running 之间只能按阶段顺序前进，completed 只能来自最后一个阶段
    pub fn allows(&self, from: JobStatus, to: JobStatus) -> bool {
        let phases = self.phases();
        let position = |p: PhaseKind| phases.iter().position(|x| *x == p);
        match (from, to) {
            (JobStatus::Pending, JobStatus::Running(p)) => p == self.first_phase(),
            (JobStatus::Pending, JobStatus::Failed) => true,
            (JobStatus::Running(a), JobStatus::Running(b)) => match (position(a), position(b)) {
                (Some(i), Some(j)) => j == i + 1,
                _ => false,
            },
            (JobStatus::Running(p), JobStatus::Completed) => p == self.last_phase(),
            (JobStatus::Running(_), JobStatus::Failed) => true,
            _ => false,
        }
    }

    /// 检查每个阶段都有实现
    pub fn validate(&self, phases: &PhaseSet) -> Result<(), ConfigError> {
        match self.phases().iter().find(|p| !phases.contains(**p)) {
            Some(missing) => Err(ConfigError::UnregisteredPhase {
                workflow: self.name().to_string(),
                phase: *missing,
            }),
            None => Ok(()),
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WorkflowKind {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowKind::ALL
            .into_iter()
            .find(|w| w.name() == s)
            .ok_or_else(|| JobError::UnknownWorkflow(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const W: WorkflowKind = WorkflowKind::ReportSuggestExecute;

    #[test]
    fn test_lookup() {
        assert_eq!("report_suggest_execute".parse::<WorkflowKind>().unwrap(), W);
        let err = "invalid_workflow".parse::<WorkflowKind>().unwrap_err();
        assert!(matches!(err, JobError::UnknownWorkflow(ref n) if n == "invalid_workflow"));
    }

    #[test]
    fn test_initial_input_requires_query() {
        let mut params = Map::new();
        assert!(matches!(
            W.initial_input(&params),
            Err(JobError::MissingParameter(_))
        ));

        params.insert("query".into(), Value::String("   ".into()));
        assert!(W.initial_input(&params).is_err());

        params.insert("query".into(), Value::from(42));
        assert!(W.initial_input(&params).is_err());

        params.insert("query".into(), Value::String(" graph algorithms ".into()));
        assert_eq!(
            W.initial_input(&params).unwrap(),
            Artifact::Text("graph algorithms".into())
        );
    }

    #[test]
    fn test_transitions_follow_phase_order() {
        use JobStatus::*;
        use PhaseKind::*;

        assert!(W.allows(Pending, Running(Report)));
        assert!(W.allows(Pending, Failed));
        assert!(W.allows(Running(Report), Running(Suggest)));
        assert!(W.allows(Running(Suggest), Running(Execute)));
        assert!(W.allows(Running(Execute), Completed));
        assert!(W.allows(Running(Suggest), Failed));

        assert!(!W.allows(Pending, Running(Suggest)));
        assert!(!W.allows(Pending, Completed));
        assert!(!W.allows(Running(Report), Running(Execute)));
        assert!(!W.allows(Running(Suggest), Running(Report)));
        assert!(!W.allows(Running(Report), Completed));
        assert!(!W.allows(Completed, Failed));
        assert!(!W.allows(Failed, Running(Report)));
    }

    #[test]
    fn test_validate_against_phase_set() {
        assert!(W.validate(&PhaseSet::standard()).is_ok());
        let err = W.validate(&PhaseSet::default()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnregisteredPhase { phase: PhaseKind::Report, .. }
        ));
    }
}
