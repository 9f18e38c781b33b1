//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `HPCA__*` 覆盖（双下划线表示嵌套，如 `HPCA__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub jobs: JobsSection,
}

/// [app] 段：应用名、任务产物根目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 任务目录根，未设置时用 ./jobs
    pub jobs_root: Option<PathBuf>,
}

impl AppSection {
    pub fn jobs_root(&self) -> PathBuf {
        self.jobs_root
            .clone()
            .unwrap_or_else(|| PathBuf::from("jobs"))
    }
}

/// [server] 段：监听地址与关闭时等待在途任务的上限
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    30
}

/// [storage] 段：产物存储后端
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 每个任务一个目录（默认）
    #[default]
    Fs,
    /// 进程内存，重启即丢失
    Memory,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct StorageSection {
    #[serde(default)]
    pub backend: StorageBackend,
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock / none；none 表示模型不可用（降级输出占位文本）
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    pub base_url: Option<String>,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

fn default_model() -> String {
    crate::llm::DEEPSEEK_CHAT.to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    120
}

/// [tools] 段：工具超时、search（arXiv）与 notify（Webhook）
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default)]
    pub search: SearchSection,
    #[serde(default)]
    pub notify: NotifySection,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            search: SearchSection::default(),
            notify: NotifySection::default(),
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

/// [tools.search] 段：arXiv API 地址、返回条数、请求超时
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_search_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_base_url() -> String {
    "http://export.arxiv.org/api/query".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_search_timeout_secs() -> u64 {
    15
}

/// [tools.notify] 段：未配置 webhook_url 时通知只写日志
#[derive(Debug, Clone, Deserialize)]
pub struct NotifySection {
    pub webhook_url: Option<String>,
    #[serde(default = "default_recipient")]
    pub default_recipient: String,
    #[serde(default = "default_notify_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotifySection {
    fn default() -> Self {
        Self {
            webhook_url: None,
            default_recipient: default_recipient(),
            timeout_secs: default_notify_timeout_secs(),
        }
    }
}

fn default_recipient() -> String {
    "user@localhost".to_string()
}

fn default_notify_timeout_secs() -> u64 {
    10
}

/// [jobs] 段：状态查询时的陈旧判定（0 关闭）
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobsSection {
    #[serde(default)]
    pub stale_after_secs: u64,
}

/// 从 config 目录加载配置，环境变量 HPCA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HPCA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HPCA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
        assert_eq!(cfg.storage.backend, StorageBackend::Fs);
        assert_eq!(cfg.tools.search.max_results, 3);
        assert_eq!(cfg.tools.notify.default_recipient, "user@localhost");
        assert_eq!(cfg.jobs.stale_after_secs, 0);
        assert_eq!(cfg.app.jobs_root(), PathBuf::from("jobs"));
    }

    #[test]
    fn test_load_from_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            r#"
[storage]
backend = "memory"

[llm]
provider = "none"

[jobs]
stale_after_secs = 600
"#,
        )
        .unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.storage.backend, StorageBackend::Memory);
        assert_eq!(cfg.llm.provider, "none");
        assert_eq!(cfg.jobs.stale_after_secs, 600);
        assert_eq!(cfg.llm.timeouts.request, 120);
    }
}
