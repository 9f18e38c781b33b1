//! Execute 阶段：逐条"执行"建议，写执行日志，尽力发送完成通知

use async_trait::async_trait;
use serde_json::Value;

use crate::core::{DegradedReason, JobError};
use crate::phases::{Phase, PhaseContext, Suggestions};
use crate::storage::Artifact;
use crate::tools::NOTIFY_TOOL;
use crate::workflow::PhaseKind;

fn render_recommendation(rec: &Value) -> String {
    match rec {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub struct ExecutePhase;

#[async_trait]
impl Phase for ExecutePhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Execute
    }

    async fn run(&self, ctx: &PhaseContext, input: Artifact) -> Result<Artifact, JobError> {
        let Artifact::Structured(value) = input else {
            return Err(JobError::PhaseInput {
                phase: PhaseKind::Execute,
                expected: "structured",
            });
        };
        let suggestions: Suggestions = serde_json::from_value(value)
            .map_err(|e| JobError::Internal(format!("malformed suggestions: {}", e)))?;

        let lines: Vec<String> = suggestions
            .recommendations
            .iter()
            .map(|rec| {
                let line = format!("Executing: {}", render_recommendation(rec));
                tracing::info!(job_id = %ctx.job_id, "{}", line);
                line
            })
            .collect();
        let summary = format!(
            "Execution summary for job {}:\n{}",
            ctx.job_id,
            lines.join("\n")
        );

        let caps = &ctx.capabilities;
        let to = ctx
            .str_param("notify")
            .unwrap_or_else(|| caps.notify_recipient());
        let args = serde_json::json!({
            "to": to,
            "subject": format!("Job {} completed", ctx.job_id),
            "body": summary,
        });
        if let Err(e) = caps.call_tool(NOTIFY_TOOL, args).await {
            tracing::warn!(job_id = %ctx.job_id, reason = %DegradedReason::Notification, error = %e, "notification not delivered");
        }

        Ok(Artifact::Text(summary))
    }
}
