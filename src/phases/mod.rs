//! 阶段执行器
//!
//! 每个阶段接收上一阶段的产物，返回自己的产物；模型与工具通过 PhaseContext 中的 Capabilities 调用。
//! - **report**: 检索 + 生成报告（文本）
//! - **suggest**: 报告 → 建议列表（结构化）
//! - **execute**: 逐条执行建议并通知（文本日志）

pub mod execute;
pub mod report;
pub mod suggest;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::core::{Capabilities, JobError};
use crate::storage::Artifact;
use crate::workflow::{JobId, PhaseKind};

pub use execute::ExecutePhase;
pub use report::{ReportPhase, PLACEHOLDER_REPORT};
pub use suggest::{parse_recommendations, recommendation_schema_json, SuggestPhase, Suggestions};

/// 阶段运行上下文
#[derive(Clone)]
pub struct PhaseContext {
    pub job_id: JobId,
    pub params: Map<String, Value>,
    pub capabilities: Arc<Capabilities>,
}

impl PhaseContext {
    /// 取字符串参数（空白视为缺失）
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// 单个阶段
#[async_trait]
pub trait Phase: Send + Sync {
    fn kind(&self) -> PhaseKind;

    /// 执行阶段；返回 Err 时任务进入 failed
    async fn run(&self, ctx: &PhaseContext, input: Artifact) -> Result<Artifact, JobError>;
}

/// 按类型索引的阶段实现
#[derive(Clone, Default)]
pub struct PhaseSet {
    phases: HashMap<PhaseKind, Arc<dyn Phase>>,
}

impl PhaseSet {
    /// 内置三个阶段
    pub fn standard() -> Self {
        Self::default()
            .with(Arc::new(ReportPhase))
            .with(Arc::new(SuggestPhase))
            .with(Arc::new(ExecutePhase))
    }

    /// 注册（或替换）一个阶段
    pub fn with(mut self, phase: Arc<dyn Phase>) -> Self {
        self.phases.insert(phase.kind(), phase);
        self
    }

    pub fn get(&self, kind: PhaseKind) -> Option<Arc<dyn Phase>> {
        self.phases.get(&kind).cloned()
    }

    pub fn contains(&self, kind: PhaseKind) -> bool {
        self.phases.contains_key(&kind)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_set_covers_all_kinds() {
        let set = PhaseSet::standard();
        for kind in PhaseKind::ALL {
            assert_eq!(set.get(kind).unwrap().kind(), kind);
        }
        assert!(!PhaseSet::default().contains(PhaseKind::Report));
    }

    #[test]
    fn test_str_param_ignores_blank() {
        let (caps, _) = test_support::capabilities(None, Ok(""), Ok(""));
        let ctx = test_support::context(caps, serde_json::json!({"notify": "  ", "query": "x"}));
        assert_eq!(ctx.str_param("notify"), None);
        assert_eq!(ctx.str_param("query"), Some("x"));
    }
}
