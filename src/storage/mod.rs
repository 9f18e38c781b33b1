//! 产物存储：按 (job_id, 产物名) 寻址的键值持久化
//!
//! 每个任务一个命名空间，首次写入时创建。本层不做加锁：同一任务的写入由 WorkflowEngine 串行完成。
//! - **fs**: 每个任务一个目录，结构化产物写为 JSON，文本产物原样写入
//! - **memory**: 进程内 HashMap，测试与临时部署用

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::StoreError;

pub use fs::FsArtifactStore;
pub use memory::MemoryArtifactStore;

/// 任务元数据
pub const JOB_METADATA: &str = "job.json";
/// Report 阶段产物
pub const REPORT: &str = "report.md";
/// Suggest 阶段产物
pub const SUGGESTIONS: &str = "suggestions.json";
/// Execute 阶段产物
pub const EXECUTION_LOG: &str = "execution.log";
/// 主结果：成功时被最后一个阶段的输出覆盖
pub const PRIMARY_RESULT: &str = "result.md";

/// 单个产物：结构化数据或文本
#[derive(Debug, Clone, PartialEq)]
pub enum Artifact {
    Structured(Value),
    Text(String),
}

impl Artifact {
    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Structured(_) => "structured",
            Artifact::Text(_) => "text",
        }
    }

    /// 文本视图：结构化数据转为缩进 JSON
    pub fn to_text(&self) -> String {
        match self {
            Artifact::Text(s) => s.clone(),
            Artifact::Structured(v) => {
                serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
            }
        }
    }
}

/// 产物存储接口
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// 写入结构化产物（覆盖）
    async fn put(&self, job_id: &str, name: &str, content: &Value) -> Result<(), StoreError>;

    /// 读取结构化产物；任务或产物不存在时返回 NotFound
    async fn get(&self, job_id: &str, name: &str) -> Result<Value, StoreError>;

    /// 写入文本产物（覆盖）
    async fn put_text(&self, job_id: &str, name: &str, content: &str) -> Result<(), StoreError>;

    /// 读取文本产物；任务或产物不存在时返回 NotFound
    async fn get_text(&self, job_id: &str, name: &str) -> Result<String, StoreError>;

    /// 任务命名空间是否存在
    async fn exists(&self, job_id: &str) -> Result<bool, StoreError>;

    /// 按产物类型分派到 put / put_text
    async fn put_artifact(
        &self,
        job_id: &str,
        name: &str,
        artifact: &Artifact,
    ) -> Result<(), StoreError> {
        match artifact {
            Artifact::Structured(v) => self.put(job_id, name, v).await,
            Artifact::Text(s) => self.put_text(job_id, name, s).await,
        }
    }
}

/// 校验 job_id / 产物名：必须是单个路径段
pub fn validate_key(key: &str) -> Result<(), StoreError> {
    let invalid = key.is_empty()
        || key.len() > 128
        || key == "."
        || key == ".."
        || key.chars().any(|c| c == '/' || c == '\\' || c == '\0');
    if invalid {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// 读路径上的校验：非法键等同于不存在
pub(crate) fn validate_lookup(job_id: &str, name: &str) -> Result<(), StoreError> {
    if validate_key(job_id).is_err() || validate_key(name).is_err() {
        return Err(StoreError::NotFound {
            job_id: job_id.to_string(),
            name: name.to_string(),
        });
    }
    Ok(())
}
