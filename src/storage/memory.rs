//! 内存产物存储（测试与临时部署）

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::core::StoreError;
use crate::storage::{validate_key, validate_lookup, Artifact, ArtifactStore};

/// job_id -> (产物名 -> 产物)
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    jobs: RwLock<HashMap<String, HashMap<String, Artifact>>>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 是否尚无任何任务命名空间
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn insert(&self, job_id: &str, name: &str, artifact: Artifact) -> Result<(), StoreError> {
        validate_key(job_id)?;
        validate_key(name)?;
        self.jobs
            .write()
            .await
            .entry(job_id.to_string())
            .or_default()
            .insert(name.to_string(), artifact);
        Ok(())
    }

    async fn lookup(&self, job_id: &str, name: &str) -> Result<Artifact, StoreError> {
        validate_lookup(job_id, name)?;
        self.jobs
            .read()
            .await
            .get(job_id)
            .and_then(|artifacts| artifacts.get(name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                job_id: job_id.to_string(),
                name: name.to_string(),
            })
    }
}

#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, job_id: &str, name: &str, content: &Value) -> Result<(), StoreError> {
        self.insert(job_id, name, Artifact::Structured(content.clone())).await
    }

    async fn get(&self, job_id: &str, name: &str) -> Result<Value, StoreError> {
        // 与 fs 后端一致：文本产物按 JSON 解析
        match self.lookup(job_id, name).await? {
            Artifact::Structured(v) => Ok(v),
            Artifact::Text(s) => Ok(serde_json::from_str(&s)?),
        }
    }

    async fn put_text(&self, job_id: &str, name: &str, content: &str) -> Result<(), StoreError> {
        self.insert(job_id, name, Artifact::Text(content.to_string())).await
    }

    async fn get_text(&self, job_id: &str, name: &str) -> Result<String, StoreError> {
        Ok(self.lookup(job_id, name).await?.to_text())
    }

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        Ok(self.jobs.read().await.contains_key(job_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JOB_METADATA, SUGGESTIONS};

    #[tokio::test]
    async fn test_namespace_created_on_first_write() {
        let store = MemoryArtifactStore::new();
        assert!(!store.exists("job-1").await.unwrap());

        store
            .put("job-1", SUGGESTIONS, &serde_json::json!({"recommendations": ["a"]}))
            .await
            .unwrap();
        assert!(store.exists("job-1").await.unwrap());
        assert!(store.get("job-1", JOB_METADATA).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_jobs_are_disjoint() {
        let store = MemoryArtifactStore::new();
        store.put_text("a", "execution.log", "one").await.unwrap();
        store.put_text("b", "execution.log", "two").await.unwrap();

        assert_eq!(store.get_text("a", "execution.log").await.unwrap(), "one");
        assert_eq!(store.get_text("b", "execution.log").await.unwrap(), "two");
    }
}
