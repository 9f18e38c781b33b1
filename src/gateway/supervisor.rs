//! 任务监管者
//!
//! 每个任务在独立的 tokio 任务中运行，由 TaskTracker 跟踪以便关闭时排空。
//! 监视任务等待执行任务的 JoinHandle：panic 或被取消时记录日志并把任务标记为 failed，进程继续运行。

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::workflow::{JobId, JobStatus, WorkflowEngine, WorkflowKind};

pub struct JobSupervisor {
    engine: Arc<WorkflowEngine>,
    tracker: TaskTracker,
}

impl JobSupervisor {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self {
            engine,
            tracker: TaskTracker::new(),
        }
    }

    /// 后台执行任务，立即返回；句柄在任务结束（包括 panic）后给出终态
    pub fn spawn(
        &self,
        job_id: JobId,
        workflow: WorkflowKind,
        params: Map<String, Value>,
    ) -> JoinHandle<JobStatus> {
        let engine = Arc::clone(&self.engine);
        let run_id = job_id.clone();
        let inner = self
            .tracker
            .spawn(async move { engine.run(&run_id, workflow, params).await });

        let engine = Arc::clone(&self.engine);
        self.tracker.spawn(async move {
            match inner.await {
                Ok(status) => status,
                Err(e) => {
                    let reason = if e.is_panic() {
                        "job task panicked"
                    } else {
                        "job task cancelled"
                    };
                    tracing::error!(job_id = %job_id, error = %e, "{}", reason);
                    if let Err(mark_err) = engine.mark_failed(&job_id, reason).await {
                        tracing::error!(job_id = %job_id, error = %mark_err, "could not record failed status");
                    }
                    JobStatus::Failed
                }
            }
        })
    }

    /// 运行中的任务数（执行任务与监视任务各计一个）
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// 停止接收新任务并等待在途任务结束；超时返回 false
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(tasks = pending, "waiting for in-flight jobs");
        }
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    tasks = self.tracker.len(),
                    "in-flight jobs still running after {}s, leaving them as-is",
                    timeout.as_secs()
                );
                false
            }
        }
    }
}
