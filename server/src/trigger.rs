use async_trait::async_trait;
use indexer::{build_job, JobConfig, JobError, JobReport, SnapshotJob};

/// Something that can run one gauge history snapshot on demand
#[async_trait]
pub trait SnapshotTrigger: Send + Sync {
    async fn trigger(&self) -> Result<JobReport, JobError>;
}

/// Reads the environment and connects fresh clients on every invocation
#[derive(Debug, Default)]
pub struct EnvTrigger;

#[async_trait]
impl SnapshotTrigger for EnvTrigger {
    async fn trigger(&self) -> Result<JobReport, JobError> {
        let config = JobConfig::from_env()?;
        let job = build_job(&config).await?;
        job.run().await
    }
}

#[async_trait]
impl SnapshotTrigger for SnapshotJob {
    async fn trigger(&self) -> Result<JobReport, JobError> {
        self.run().await
    }
}
