//! Report 阶段：arXiv 检索结果 + 模型生成报告

use async_trait::async_trait;

use crate::core::{DegradedReason, JobError};
use crate::phases::{Phase, PhaseContext};
use crate::storage::Artifact;
use crate::tools::SEARCH_TOOL;
use crate::workflow::PhaseKind;

pub const PLACEHOLDER_REPORT: &str =
    "This is a placeholder report because the model is not loaded.";

fn build_prompt(query: &str, search_result: &str) -> String {
    format!(
        "Based on the following information, write a report about {}:\n\n{}",
        query, search_result
    )
}

pub struct ReportPhase;

#[async_trait]
impl Phase for ReportPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Report
    }

    async fn run(&self, ctx: &PhaseContext, input: Artifact) -> Result<Artifact, JobError> {
        let Artifact::Text(query) = input else {
            return Err(JobError::PhaseInput {
                phase: PhaseKind::Report,
                expected: "text",
            });
        };
        let caps = &ctx.capabilities;

        let args = serde_json::json!({
            "query": query,
            "max_results": caps.search_max_results(),
        });
        let search_result = match caps.call_tool(SEARCH_TOOL, args).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(job_id = %ctx.job_id, reason = %DegradedReason::Search, error = %e, "search failed, continuing without results");
                format!("(search unavailable: {})", e)
            }
        };

        let report = match caps.generate(&build_prompt(&query, &search_result)).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(job_id = %ctx.job_id, reason = %DegradedReason::Generation, error = %e, "using placeholder report");
                PLACEHOLDER_REPORT.to_string()
            }
        };
        tracing::info!(job_id = %ctx.job_id, chars = report.chars().count(), "report generated");
        Ok(Artifact::Text(report))
    }
}
