//! 文件系统产物存储
//!
//! 布局：`<root>/<job_id>/<name>`。写入先落临时文件再 rename，状态查询不会读到半截的 job.json。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tokio::fs;

use crate::core::StoreError;
use crate::storage::{validate_key, validate_lookup, ArtifactStore};

#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    /// 创建存储；根目录不存在时自动创建
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    async fn write_atomic(&self, job_id: &str, name: &str, bytes: &[u8]) -> Result<(), StoreError> {
        validate_key(job_id)?;
        validate_key(name)?;
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir).await?;
        let tmp = dir.join(format!(".{}.tmp", name));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, dir.join(name)).await?;
        Ok(())
    }

    async fn read(&self, job_id: &str, name: &str) -> Result<String, StoreError> {
        validate_lookup(job_id, name)?;
        match fs::read_to_string(self.job_dir(job_id).join(name)).await {
            Ok(s) => Ok(s),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound {
                job_id: job_id.to_string(),
                name: name.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, job_id: &str, name: &str, content: &Value) -> Result<(), StoreError> {
        let data = serde_json::to_vec_pretty(content)?;
        self.write_atomic(job_id, name, &data).await
    }

    async fn get(&self, job_id: &str, name: &str) -> Result<Value, StoreError> {
        let data = self.read(job_id, name).await?;
        Ok(serde_json::from_str(&data)?)
    }

    async fn put_text(&self, job_id: &str, name: &str, content: &str) -> Result<(), StoreError> {
        self.write_atomic(job_id, name, content.as_bytes()).await
    }

    async fn get_text(&self, job_id: &str, name: &str) -> Result<String, StoreError> {
        self.read(job_id, name).await
    }

    async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
        if validate_key(job_id).is_err() {
            return Ok(false);
        }
        Ok(fs::try_exists(self.job_dir(job_id)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Artifact, JOB_METADATA, REPORT};

    #[tokio::test]
    async fn test_put_get_structured_and_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("jobs")).unwrap();

        let meta = serde_json::json!({"status": "pending", "params": {"query": "q"}});
        store.put("job-1", JOB_METADATA, &meta).await.unwrap();
        store.put_text("job-1", REPORT, "# Report").await.unwrap();

        assert_eq!(store.get("job-1", JOB_METADATA).await.unwrap(), meta);
        assert_eq!(store.get_text("job-1", REPORT).await.unwrap(), "# Report");
        assert!(dir.path().join("jobs/job-1/job.json").exists());
        assert!(!dir.path().join("jobs/job-1/.job.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_missing_job_and_artifact_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        assert!(store.get("nope", JOB_METADATA).await.unwrap_err().is_not_found());

        store.put_text("job-1", REPORT, "x").await.unwrap();
        assert!(store.get_text("job-1", "missing.md").await.unwrap_err().is_not_found());
        assert!(store.exists("job-1").await.unwrap());
        assert!(!store.exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_path_escape_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path().join("jobs")).unwrap();

        let err = store.put_text("..", REPORT, "x").await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_)));
        assert!(store.get_text("..", "jobs").await.unwrap_err().is_not_found());
        assert!(!store.exists("../jobs").await.unwrap());
    }

    #[tokio::test]
    async fn test_overwrite_via_put_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path()).unwrap();

        store
            .put_artifact("job-1", REPORT, &Artifact::Text("first".into()))
            .await
            .unwrap();
        store
            .put_artifact("job-1", REPORT, &Artifact::Text("second".into()))
            .await
            .unwrap();
        assert_eq!(store.get_text("job-1", REPORT).await.unwrap(), "second");
    }
}
