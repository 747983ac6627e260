use crate::core::error::JobError;
use crate::core::model::AutobiographyResult;
use crate::core::state::PipelineStep;
use crate::services::workflow::{WorkflowManager, WorkflowObserver};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

/// Latest snapshot of one generation job.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    pub progress: u8,
    pub result: Option<AutobiographyResult>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub status: JobState,
    pub progress: Option<u8>,
    pub result: Option<AutobiographyResult>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn progress(status: JobState, progress: u8) -> Self {
        Self {
            status,
            progress: Some(progress),
            result: None,
            error: None,
        }
    }
}

#[async_trait]
pub trait JobRegistry: Send + Sync {
    async fn create(&self, job_id: &str) -> JobStatus;
    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<JobStatus, JobError>;
    async fn get(&self, job_id: &str) -> Result<JobStatus, JobError>;
}

#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<HashMap<String, JobStatus>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn create(&self, job_id: &str) -> JobStatus {
        let now = Utc::now();
        let status = JobStatus {
            job_id: job_id.to_string(),
            status: JobState::Pending,
            progress: 0,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.jobs
            .write()
            .await
            .insert(job_id.to_string(), status.clone());
        status
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<JobStatus, JobError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        job.status = update.status;
        if let Some(progress) = update.progress {
            job.progress = progress.min(100);
        }
        if update.result.is_some() {
            job.result = update.result;
        }
        if update.error.is_some() {
            job.error = update.error;
        }
        job.updated_at = Utc::now();
        Ok(job.clone())
    }

    async fn get(&self, job_id: &str) -> Result<JobStatus, JobError> {
        self.jobs
            .read()
            .await
            .get(job_id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))
    }
}

/// Reports the step a job is entering as coarse progress.
struct ProgressReporter {
    registry: Arc<dyn JobRegistry>,
    job_id: String,
}

fn step_progress(step: PipelineStep) -> u8 {
    match step {
        PipelineStep::Analyze => 10,
        PipelineStep::ExtractPeriods => 30,
        PipelineStep::Integrate => 70,
        PipelineStep::Complete => 100,
    }
}

#[async_trait]
impl WorkflowObserver for ProgressReporter {
    async fn on_step(&self, step: PipelineStep) {
        // Completion is recorded together with the result.
        if step == PipelineStep::Complete {
            return;
        }
        let update = JobUpdate::progress(JobState::Processing, step_progress(step));
        if let Err(e) = self.registry.update(&self.job_id, update).await {
            warn!("Could not record progress for job {}: {}", self.job_id, e);
        }
    }
}

/// Registers a job and runs the pipeline for it in the background.
pub async fn spawn_generation(
    workflow: Arc<WorkflowManager>,
    registry: Arc<dyn JobRegistry>,
    transcript: String,
) -> (String, JoinHandle<()>) {
    let job_id = Uuid::new_v4().to_string();
    registry.create(&job_id).await;
    info!("Job {} created", job_id);

    let id = job_id.clone();
    let handle = tokio::spawn(async move {
        let reporter = ProgressReporter {
            registry: registry.clone(),
            job_id: id.clone(),
        };

        let update = match workflow.run_observed(&transcript, Some(&reporter)).await {
            Ok(result) => {
                info!("Job {} completed", id);
                JobUpdate {
                    status: JobState::Completed,
                    progress: Some(step_progress(PipelineStep::Complete)),
                    result: Some(result),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Job {} failed: {}", id, e);
                JobUpdate {
                    status: JobState::Failed,
                    progress: None,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        };

        if let Err(e) = registry.update(&id, update).await {
            warn!("Could not record outcome for job {}: {}", id, e);
        }
    });

    (job_id, handle)
}
