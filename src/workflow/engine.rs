//! 工作流引擎
//!
//! 按工作流的阶段顺序串行执行，管理任务状态机：
//! `pending → running_<phase_1> → … → running_<phase_n> → completed`，任意 running（以及前置条件失败时的 pending）可转入 failed。
//! 每个阶段开始前先持久化 running 状态，阶段结束后立即写入该阶段产物；
//! 最后一个阶段成功后写主结果，再写 completed。执行中的任何错误都落为 failed，run 不向调用方返回错误。

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::core::{Capabilities, ConfigError, JobError, StoreError};
use crate::phases::{PhaseContext, PhaseSet};
use crate::storage::{ArtifactStore, JOB_METADATA, PRIMARY_RESULT};
use crate::workflow::{JobRecord, JobStatus, WorkflowKind};

/// 读取任务元数据；不存在时返回 JobError::NotFound
pub async fn read_record(store: &dyn ArtifactStore, job_id: &str) -> Result<JobRecord, JobError> {
    let value = store.get(job_id, JOB_METADATA).await.map_err(|e| {
        if e.is_not_found() {
            JobError::NotFound(job_id.to_string())
        } else {
            JobError::Storage(e)
        }
    })?;
    serde_json::from_value(value).map_err(|e| JobError::Storage(StoreError::Serde(e)))
}

/// 覆盖写入任务元数据
pub async fn write_record(store: &dyn ArtifactStore, record: &JobRecord) -> Result<(), JobError> {
    let value = serde_json::to_value(record).map_err(StoreError::from)?;
    store.put(&record.job_id, JOB_METADATA, &value).await?;
    Ok(())
}

/// 工作流引擎
pub struct WorkflowEngine {
    store: Arc<dyn ArtifactStore>,
    capabilities: Arc<Capabilities>,
    phases: PhaseSet,
}

impl WorkflowEngine {
    /// 创建引擎；任一工作流引用了未注册的阶段即为配置错误
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        capabilities: Arc<Capabilities>,
        phases: PhaseSet,
    ) -> Result<Self, ConfigError> {
        for workflow in WorkflowKind::ALL {
            workflow.validate(&phases)?;
        }
        Ok(Self {
            store,
            capabilities,
            phases,
        })
    }

    /// 执行整个工作流，返回终态（completed / failed）
    pub async fn run(
        &self,
        job_id: &str,
        workflow: WorkflowKind,
        params: Map<String, Value>,
    ) -> JobStatus {
        let started = Instant::now();
        match self.execute(job_id, workflow, params).await {
            Ok(()) => {
                tracing::info!(job_id = %job_id, workflow = %workflow, elapsed_ms = started.elapsed().as_millis() as u64, "job completed");
                JobStatus::Completed
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, workflow = %workflow, error = %e, "job failed");
                if let Err(write_err) = self.fail(job_id, workflow, &e.to_string()).await {
                    tracing::error!(job_id = %job_id, error = %write_err, "could not record failed status");
                }
                JobStatus::Failed
            }
        }
    }

    /// 将未结束的任务标记为 failed（监管者在任务 panic 时调用）
    pub async fn mark_failed(&self, job_id: &str, reason: &str) -> Result<(), JobError> {
        let record = read_record(self.store.as_ref(), job_id).await?;
        if record.status.is_terminal() {
            tracing::debug!(job_id = %job_id, status = %record.status, "already terminal, not marking failed");
            return Ok(());
        }
        let workflow: WorkflowKind = record.workflow.parse()?;
        self.fail(job_id, workflow, reason).await
    }

    async fn execute(
        &self,
        job_id: &str,
        workflow: WorkflowKind,
        params: Map<String, Value>,
    ) -> Result<(), JobError> {
        let mut input = workflow.initial_input(&params)?;
        let ctx = PhaseContext {
            job_id: job_id.to_string(),
            params,
            capabilities: Arc::clone(&self.capabilities),
        };

        for &kind in workflow.phases() {
            self.transition(job_id, workflow, JobStatus::Running(kind), None)
                .await?;
            let phase = self
                .phases
                .get(kind)
                .ok_or_else(|| JobError::Internal(format!("phase {} not registered", kind)))?;

            let started = Instant::now();
            let output = phase.run(&ctx, input).await?;
            self.store
                .put_artifact(job_id, kind.artifact_name(), &output)
                .await?;
            tracing::info!(job_id = %job_id, phase = %kind, artifact = kind.artifact_name(), elapsed_ms = started.elapsed().as_millis() as u64, "phase finished");
            input = output;
        }

        self.store
            .put_text(job_id, PRIMARY_RESULT, &input.to_text())
            .await?;
        self.transition(job_id, workflow, JobStatus::Completed, None)
            .await
    }

    async fn fail(&self, job_id: &str, workflow: WorkflowKind, reason: &str) -> Result<(), JobError> {
        self.transition(job_id, workflow, JobStatus::Failed, Some(reason.to_string()))
            .await
    }

    /// 校验并持久化状态迁移
    async fn transition(
        &self,
        job_id: &str,
        workflow: WorkflowKind,
        to: JobStatus,
        error: Option<String>,
    ) -> Result<(), JobError> {
        let mut record = read_record(self.store.as_ref(), job_id).await?;
        let from = record.status;
        if !workflow.allows(from, to) {
            return Err(JobError::InvalidTransition { from, to });
        }
        record.status = to;
        record.updated_at = chrono::Utc::now();
        record.error = error;
        write_record(self.store.as_ref(), &record).await?;
        tracing::info!(job_id = %job_id, from = %from, status = %to, "status updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::llm::{LlmClient, ScriptedLlmClient};
    use crate::phases::test_support::capabilities;
    use crate::phases::Phase;
    use crate::storage::{Artifact, MemoryArtifactStore, EXECUTION_LOG, REPORT, SUGGESTIONS};
    use crate::workflow::PhaseKind;

    /// 记录每次 job.json 写入的状态
    #[derive(Default)]
    struct RecordingStore {
        inner: MemoryArtifactStore,
        statuses: Mutex<Vec<String>>,
    }

    impl RecordingStore {
        fn statuses(&self) -> Vec<String> {
            self.statuses.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ArtifactStore for RecordingStore {
        async fn put(&self, job_id: &str, name: &str, content: &Value) -> Result<(), StoreError> {
            if name == JOB_METADATA {
                let status = content["status"].as_str().unwrap_or_default().to_string();
                self.statuses.lock().unwrap().push(status);
            }
            self.inner.put(job_id, name, content).await
        }

        async fn get(&self, job_id: &str, name: &str) -> Result<Value, StoreError> {
            self.inner.get(job_id, name).await
        }

        async fn put_text(&self, job_id: &str, name: &str, content: &str) -> Result<(), StoreError> {
            self.inner.put_text(job_id, name, content).await
        }

        async fn get_text(&self, job_id: &str, name: &str) -> Result<String, StoreError> {
            self.inner.get_text(job_id, name).await
        }

        async fn exists(&self, job_id: &str) -> Result<bool, StoreError> {
            self.inner.exists(job_id).await
        }
    }

    async fn setup(
        llm: Option<Arc<dyn LlmClient>>,
        notify: Result<&str, &str>,
        params: Value,
    ) -> (WorkflowEngine, Arc<RecordingStore>, Map<String, Value>) {
        let store = Arc::new(RecordingStore::default());
        let (caps, _) = capabilities(llm, Ok("Title: Paper"), notify);
        let engine = WorkflowEngine::new(store.clone(), caps, PhaseSet::standard()).unwrap();
        let params = params.as_object().cloned().unwrap_or_default();
        let record = JobRecord::new("job-1".into(), "report_suggest_execute", params.clone());
        write_record(store.as_ref(), &record).await.unwrap();
        (engine, store, params)
    }

    #[tokio::test]
    async fn test_status_sequence_and_artifacts() {
        let llm = Arc::new(ScriptedLlmClient::new([
            Ok("Graph report".to_string()),
            Ok(r#"{"recommendations": ["Use A*"]}"#.to_string()),
        ]));
        let (engine, store, params) =
            setup(Some(llm), Ok("sent"), json!({"query": "graph algorithms"})).await;

        let status = engine
            .run("job-1", WorkflowKind::ReportSuggestExecute, params)
            .await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(
            store.statuses(),
            vec!["pending", "running_report", "running_suggest", "running_execute", "completed"]
        );

        assert_eq!(store.get_text("job-1", REPORT).await.unwrap(), "Graph report");
        assert_eq!(
            store.get("job-1", SUGGESTIONS).await.unwrap(),
            json!({"recommendations": ["Use A*"]})
        );
        let log = store.get_text("job-1", EXECUTION_LOG).await.unwrap();
        assert_eq!(log, "Execution summary for job job-1:\nExecuting: Use A*");
        assert_eq!(store.get_text("job-1", PRIMARY_RESULT).await.unwrap(), log);
    }

    #[tokio::test]
    async fn test_missing_query_fails_without_running() {
        let (engine, store, params) = setup(None, Ok("sent"), json!({"query": ""})).await;

        let status = engine
            .run("job-1", WorkflowKind::ReportSuggestExecute, params)
            .await;
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(store.statuses(), vec!["pending", "failed"]);

        let record = read_record(store.as_ref(), "job-1").await.unwrap();
        assert_eq!(
            record.error.as_deref(),
            Some("Missing required parameter: query")
        );
    }

    #[tokio::test]
    async fn test_malformed_suggestions_still_complete() {
        let llm = Arc::new(ScriptedLlmClient::new([
            Ok("report".to_string()),
            Ok("not json at all".to_string()),
        ]));
        let (engine, store, params) = setup(Some(llm), Ok("sent"), json!({"query": "q"})).await;

        let status = engine
            .run("job-1", WorkflowKind::ReportSuggestExecute, params)
            .await;
        assert_eq!(status, JobStatus::Completed);
        let log = store.get_text("job-1", EXECUTION_LOG).await.unwrap();
        assert_eq!(log.matches("Executing:").count(), 0);
    }

    #[tokio::test]
    async fn test_notification_failure_still_completes() {
        let (engine, store, params) = setup(None, Err("webhook down"), json!({"query": "q"})).await;

        let status = engine
            .run("job-1", WorkflowKind::ReportSuggestExecute, params)
            .await;
        assert_eq!(status, JobStatus::Completed);
        assert_eq!(store.statuses().last().unwrap(), "completed");
    }

    struct BrokenSuggest;

    #[async_trait]
    impl Phase for BrokenSuggest {
        fn kind(&self) -> PhaseKind {
            PhaseKind::Suggest
        }

        async fn run(&self, _ctx: &PhaseContext, _input: Artifact) -> Result<Artifact, JobError> {
            Err(JobError::Internal("suggest exploded".into()))
        }
    }

    #[tokio::test]
    async fn test_phase_error_fails_job() {
        let store = Arc::new(RecordingStore::default());
        let (caps, _) = capabilities(None, Ok(""), Ok(""));
        let phases = PhaseSet::standard().with(Arc::new(BrokenSuggest));
        let engine = WorkflowEngine::new(store.clone(), caps, phases).unwrap();
        let params = json!({"query": "q"}).as_object().cloned().unwrap();
        write_record(
            store.as_ref(),
            &JobRecord::new("job-1".into(), "report_suggest_execute", params.clone()),
        )
        .await
        .unwrap();

        let status = engine
            .run("job-1", WorkflowKind::ReportSuggestExecute, params)
            .await;
        assert_eq!(status, JobStatus::Failed);
        assert_eq!(
            store.statuses(),
            vec!["pending", "running_report", "running_suggest", "failed"]
        );
        assert!(store.get_text("job-1", PRIMARY_RESULT).await.is_err());
    }

    #[tokio::test]
    async fn test_mark_failed_skips_terminal_jobs() {
        let (engine, store, params) = setup(None, Ok("sent"), json!({"query": "q"})).await;
        engine
            .run("job-1", WorkflowKind::ReportSuggestExecute, params)
            .await;

        engine.mark_failed("job-1", "late panic").await.unwrap();
        let record = read_record(store.as_ref(), "job-1").await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);

        assert!(matches!(
            engine.mark_failed("missing", "x").await,
            Err(JobError::NotFound(_))
        ));
    }

    #[test]
    fn test_rejects_incomplete_phase_set() {
        let (caps, _) = capabilities(None, Ok(""), Ok(""));
        let store: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let err = WorkflowEngine::new(store, caps, PhaseSet::default())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::UnregisteredPhase { .. }));
    }
}
