use async_trait::async_trait;

use crate::models::GaugeSnapshot;

/// Columns the upsert resolves conflicts on
pub const CONFLICT_KEY: &str = "gauge_address,epoch_start";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store rejected write ({status}): {body}")]
    Rejected { status: u16, body: String },
}

/// Destination for gauge snapshots.
///
/// Writes replace any existing row sharing the `(gauge_address, epoch_start)` key, so
/// writing the same epoch twice leaves one row per gauge.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Inserts or replaces `rows` and returns how many were written
    async fn upsert_snapshots(&self, rows: &[GaugeSnapshot]) -> Result<u64, StoreError>;
}
