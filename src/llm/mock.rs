//! Mock LLM 客户端（用于测试与离线运行，无需 API）
//!
//! - MockLlmClient：按 prompt 内容给出确定性输出（建议 prompt 返回 JSON，其余返回报告文本）
//! - ScriptedLlmClient：按顺序回放预设响应，并记录收到的 prompt

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{LlmClient, Message, Role};

/// Mock 客户端：建议类 prompt 返回固定 JSON，其余回显 prompt 前 200 字符
#[derive(Debug, Default)]
pub struct MockLlmClient;

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| matches!(m.role, Role::User))
        .map(|m| m.content.as_str())
        .unwrap_or("(no input)")
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let prompt = last_user(messages);

        if prompt.contains("\"recommendations\"") {
            return Ok(
                r#"{"recommendations": ["Review the report findings", "Share the report with the team"]}"#
                    .to_string(),
            );
        }

        let preview: String = prompt.chars().take(200).collect();
        Ok(format!("Mock report generated from prompt:\n\n{}", preview))
    }
}

/// 回放客户端：依次返回 responses；耗尽后返回 Err
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    responses: Mutex<VecDeque<Result<String, String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedLlmClient {
    pub fn new(responses: impl IntoIterator<Item = Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的 prompt（按调用顺序）
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(last_user(messages).to_string());
        }
        self.responses
            .lock()
            .map_err(|e| e.to_string())?
            .pop_front()
            .unwrap_or_else(|| Err("script exhausted".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_answers_suggest_prompt_with_json() {
        let out = MockLlmClient
            .generate(r#"Reply with {"recommendations": [...]}"#)
            .await
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["recommendations"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_replays_in_order() {
        let llm = ScriptedLlmClient::new([Ok("one".to_string()), Err("down".to_string())]);
        assert_eq!(llm.generate("a").await.unwrap(), "one");
        assert_eq!(llm.generate("b").await.unwrap_err(), "down");
        assert!(llm.generate("c").await.is_err());
        assert_eq!(llm.prompts(), vec!["a", "b", "c"]);
    }
}
