//! notify 工具：任务完成通知
//!
//! 配置了 webhook_url 时 POST `{"to", "subject", "body"}`；未配置时只写日志。
//! 调用方（Execute 阶段）把失败视为尽力而为，不影响任务状态。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::tools::Tool;

#[derive(Debug, Serialize)]
struct Notification<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

pub struct NotifyTool {
    client: Client,
    webhook_url: Option<String>,
}

impl NotifyTool {
    pub fn new(webhook_url: Option<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

fn str_arg<'a>(args: &'a Value, key: &str) -> Result<&'a str, String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing {}", key))
}

#[async_trait]
impl Tool for NotifyTool {
    fn name(&self) -> &str {
        "notify"
    }

    fn description(&self) -> &str {
        "Send a notification. Args: {\"to\": \"recipient\", \"subject\": \"...\", \"body\": \"...\"}"
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "to": { "type": "string" },
                "subject": { "type": "string" },
                "body": { "type": "string" }
            },
            "required": ["to", "subject"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let to = str_arg(&args, "to")?;
        let subject = str_arg(&args, "subject")?;
        let body = args.get("body").and_then(|v| v.as_str()).unwrap_or("");

        let Some(url) = &self.webhook_url else {
            tracing::info!(to = %to, subject = %subject, "notification (log only, no webhook configured)");
            return Ok("Notification logged.".to_string());
        };

        let resp = self
            .client
            .post(url)
            .json(&Notification { to, subject, body })
            .send()
            .await
            .map_err(|e| format!("Failed to send notification: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("Failed to send notification: HTTP {}", resp.status()));
        }
        Ok("Notification sent successfully.".to_string())
    }
}
