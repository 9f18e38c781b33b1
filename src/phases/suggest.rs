//! Suggest 阶段：报告 → 结构化建议
//!
//! Prompt 中注入 schemars 生成的 JSON Schema；模型输出宽松解析（```json 代码块或最外层 JSON），
//! 解析失败时产出空列表并附带 error，任务继续。

use async_trait::async_trait;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{DegradedReason, JobError};
use crate::phases::{Phase, PhaseContext};
use crate::storage::Artifact;
use crate::workflow::PhaseKind;

/// 期望的模型输出格式（仅用于 Schema 生成）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct RecommendationFormat {
    /// 可执行的建议，按优先级排列
    recommendations: Vec<String>,
}

/// Suggest 阶段产物（suggestions.json）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suggestions {
    #[serde(default)]
    pub recommendations: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Suggestions {
    fn placeholder() -> Self {
        Self {
            recommendations: vec![
                Value::from("Placeholder recommendation 1"),
                Value::from("Placeholder recommendation 2"),
            ],
            error: None,
        }
    }
}

/// 建议格式的 JSON Schema 字符串
pub fn recommendation_schema_json() -> String {
    let schema = schema_for!(RecommendationFormat);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

fn build_prompt(report: &str) -> String {
    format!(
        "Based on the following report, provide a list of actionable recommendations.\n\
         Respond only with a JSON object containing a \"recommendations\" array of strings, \
         matching this JSON Schema:\n{}\n\nReport:\n{}",
        recommendation_schema_json(),
        report
    )
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// 从模型输出中提取建议列表
pub fn parse_recommendations(output: &str) -> Result<Vec<Value>, String> {
    let trimmed = output.trim();

    let json_str = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else {
        // 优先取最外层对象；只有不存在对象时才退回到数组
        outermost(trimmed, '{', '}')
            .or_else(|| outermost(trimmed, '[', ']'))
            .ok_or_else(|| "no JSON found in model output".to_string())?
    };

    match serde_json::from_str::<Value>(json_str).map_err(|e| e.to_string())? {
        Value::Object(mut obj) => match obj.remove("recommendations") {
            Some(Value::Array(recs)) => Ok(recs),
            _ => Err("missing \"recommendations\" array".to_string()),
        },
        Value::Array(recs) => Ok(recs),
        other => Err(format!("unexpected JSON value: {}", other)),
    }
}

pub struct SuggestPhase;

#[async_trait]
impl Phase for SuggestPhase {
    fn kind(&self) -> PhaseKind {
        PhaseKind::Suggest
    }

    async fn run(&self, ctx: &PhaseContext, input: Artifact) -> Result<Artifact, JobError> {
        let Artifact::Text(report) = input else {
            return Err(JobError::PhaseInput {
                phase: PhaseKind::Suggest,
                expected: "text",
            });
        };
        let caps = &ctx.capabilities;

        let suggestions = if !caps.has_model() {
            tracing::warn!(job_id = %ctx.job_id, reason = %DegradedReason::Generation, "model not loaded, using placeholder suggestions");
            Suggestions::placeholder()
        } else {
            let parsed = caps
                .generate(&build_prompt(&report))
                .await
                .and_then(|output| parse_recommendations(&output));
            match parsed {
                Ok(recommendations) => Suggestions {
                    recommendations,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(job_id = %ctx.job_id, reason = %DegradedReason::MalformedModelOutput, error = %e, "no usable suggestions");
                    Suggestions {
                        recommendations: Vec::new(),
                        error: Some(format!("Failed to generate suggestions: {}", e)),
                    }
                }
            }
        };

        tracing::info!(job_id = %ctx.job_id, count = suggestions.recommendations.len(), "suggestions ready");
        let value = serde_json::to_value(&suggestions)
            .map_err(|e| JobError::Internal(format!("serialize suggestions: {}", e)))?;
        Ok(Artifact::Structured(value))
    }
}
