//! 服务构建器：由 AppConfig 装配存储、模型、工具、工作流引擎与网关
//!
//! Capabilities 是注入到引擎与各阶段的能力对象（模型 + 工具），没有进程级单例，测试可直接换成替身。

use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, StorageBackend};
use crate::core::{ConfigError, StoreError, ToolError};
use crate::gateway::{JobGateway, JobSupervisor};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient};
use crate::phases::PhaseSet;
use crate::storage::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
use crate::tools::{NotifyTool, SearchTool, ToolExecutor, ToolRegistry, NOTIFY_TOOL, SEARCH_TOOL};
use crate::workflow::WorkflowEngine;

/// 阶段按名调用的工具，缺失即配置错误
pub const REQUIRED_TOOLS: [&str; 2] = [SEARCH_TOOL, NOTIFY_TOOL];

/// 模型与工具能力
pub struct Capabilities {
    llm: Option<Arc<dyn LlmClient>>,
    tools: ToolExecutor,
    llm_timeout: Duration,
    search_max_results: usize,
    notify_recipient: String,
}

impl Capabilities {
    /// llm 为 None 表示模型不可用（各阶段输出占位内容）
    pub fn new(llm: Option<Arc<dyn LlmClient>>, tools: ToolExecutor) -> Result<Self, ConfigError> {
        if let Some(missing) = REQUIRED_TOOLS.iter().find(|name| !tools.has_tool(name)) {
            return Err(ConfigError::MissingTool(missing.to_string()));
        }
        Ok(Self {
            llm,
            tools,
            llm_timeout: Duration::from_secs(120),
            search_max_results: 3,
            notify_recipient: "user@localhost".to_string(),
        })
    }

    pub fn with_llm_timeout(mut self, secs: u64) -> Self {
        self.llm_timeout = Duration::from_secs(secs.max(1));
        self
    }

    pub fn with_search_max_results(mut self, n: usize) -> Self {
        self.search_max_results = n.max(1);
        self
    }

    pub fn with_notify_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.notify_recipient = recipient.into();
        self
    }

    pub fn has_model(&self) -> bool {
        self.llm.is_some()
    }

    pub fn search_max_results(&self) -> usize {
        self.search_max_results
    }

    pub fn notify_recipient(&self) -> &str {
        &self.notify_recipient
    }

    /// 调用模型；不可用、超时、出错或空输出都返回 Err，由调用方替换为占位内容
    pub async fn generate(&self, prompt: &str) -> Result<String, String> {
        let llm = self.llm.as_ref().ok_or_else(|| "model not loaded".to_string())?;
        let preview: String = prompt.chars().take(100).collect();
        tracing::debug!(prompt = %preview, "generating text");

        let text = tokio::time::timeout(self.llm_timeout, llm.generate(prompt))
            .await
            .map_err(|_| format!("generation timed out after {}s", self.llm_timeout.as_secs()))??;
        if text.trim().is_empty() {
            return Err("empty completion".to_string());
        }
        let (prompt_tokens, completion_tokens, total_tokens) = llm.token_usage();
        tracing::debug!(prompt_tokens, completion_tokens, total_tokens, "cumulative token usage");
        Ok(text)
    }

    pub async fn call_tool(&self, name: &str, args: serde_json::Value) -> Result<String, ToolError> {
        self.tools.execute(name, args).await
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// 服务构建器
pub struct ServiceBuilder {
    config: AppConfig,
}

impl ServiceBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// 根据 [llm].provider 选择后端；缺少 API Key 时降级为无模型
    pub fn build_llm(&self) -> Result<Option<Arc<dyn LlmClient>>, ConfigError> {
        let llm = &self.config.llm;
        let provider = llm.provider.to_lowercase();
        match provider.as_str() {
            "none" => {
                tracing::info!("LLM disabled by config, phases will emit placeholder output");
                Ok(None)
            }
            "mock" => {
                tracing::info!("Using Mock LLM");
                Ok(Some(Arc::new(MockLlmClient)))
            }
            "deepseek" => {
                // 兼容只配置了 OPENAI_API_KEY 的部署
                let key = env_key("DEEPSEEK_API_KEY").or_else(|| env_key("OPENAI_API_KEY"));
                match key {
                    Some(key) => {
                        tracing::info!("Using DeepSeek LLM ({})", llm.model);
                        Ok(Some(Arc::new(OpenAiClient::deepseek(&llm.model, &key))))
                    }
                    None => {
                        tracing::warn!("DEEPSEEK_API_KEY not set, running without model");
                        Ok(None)
                    }
                }
            }
            "openai" => {
                // 自建 vLLM 等兼容端点通常不校验 key
                let key = env_key("OPENAI_API_KEY")
                    .or_else(|| llm.base_url.as_ref().map(|_| "EMPTY".to_string()));
                match key {
                    Some(key) => {
                        tracing::info!("Using OpenAI-compatible LLM ({})", llm.model);
                        Ok(Some(Arc::new(OpenAiClient::new(
                            llm.base_url.as_deref(),
                            &llm.model,
                            &key,
                        ))))
                    }
                    None => {
                        tracing::warn!("OPENAI_API_KEY not set and no base_url, running without model");
                        Ok(None)
                    }
                }
            }
            _ => Err(ConfigError::UnknownProvider(llm.provider.clone())),
        }
    }

    /// 构建工具注册表（search + notify）
    pub fn build_tool_registry(&self) -> ToolRegistry {
        let tools = &self.config.tools;
        let mut registry = ToolRegistry::new();
        registry.register(SearchTool::new(
            tools.search.base_url.clone(),
            tools.search.timeout_secs,
            tools.search.max_results,
        ));
        registry.register(NotifyTool::new(
            tools.notify.webhook_url.clone(),
            tools.notify.timeout_secs,
        ));
        registry
    }

    pub fn build_capabilities(&self) -> Result<Capabilities, ConfigError> {
        let cfg = &self.config;
        let executor = ToolExecutor::new(self.build_tool_registry(), cfg.tools.tool_timeout_secs);
        tracing::info!(tools = ?executor.tool_names(), "tools registered");
        Ok(Capabilities::new(self.build_llm()?, executor)?
            .with_llm_timeout(cfg.llm.timeouts.request)
            .with_search_max_results(cfg.tools.search.max_results)
            .with_notify_recipient(cfg.tools.notify.default_recipient.clone()))
    }

    pub fn build_store(&self) -> Result<Arc<dyn ArtifactStore>, StoreError> {
        match self.config.storage.backend {
            StorageBackend::Fs => {
                let root = self.config.app.jobs_root();
                tracing::info!(root = %root.display(), "Using filesystem artifact store");
                Ok(Arc::new(FsArtifactStore::new(root)?))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory artifact store, jobs are lost on restart");
                Ok(Arc::new(MemoryArtifactStore::new()))
            }
        }
    }

    /// 装配完整网关：存储 → 能力 → 引擎（校验工作流注册）→ 监管者 → 网关
    pub fn build_gateway(&self) -> anyhow::Result<Arc<JobGateway>> {
        let store = self.build_store()?;
        let capabilities = Arc::new(self.build_capabilities()?);
        let engine = Arc::new(WorkflowEngine::new(
            Arc::clone(&store),
            capabilities,
            PhaseSet::standard(),
        )?);
        let supervisor = Arc::new(JobSupervisor::new(engine));
        Ok(Arc::new(
            JobGateway::new(store, supervisor).with_stale_after(self.config.jobs.stale_after_secs),
        ))
    }
}
