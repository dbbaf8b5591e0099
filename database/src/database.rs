use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Error, Postgres, Result as SqlxResult, Transaction};

use super::models::GaugeSnapshot;
use super::store::{SnapshotStore, StoreError};

#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(url: &str) -> Result<Self, Error> {
        let pool = PgPoolOptions::new().max_connections(5).connect(url).await?;

        Ok(Self { pool })
    }

    /// Applies the bundled migrations
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        Ok(())
    }

    pub async fn start_transaction(&self) -> SqlxResult<Transaction<'_, Postgres>> {
        self.pool.begin().await
    }

    /// Creates or replaces a gauge snapshot for its epoch
    pub async fn upsert_gauge_snapshot(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        snapshot: &GaugeSnapshot,
    ) -> SqlxResult<()> {
        sqlx::query(
            "
insert into gauge_history (
    gauge_address,
    epoch_start,
    vemezo_weight,
    vebtc_weight,
    boost_multiplier,
    total_incentives_usd,
    apy,
    unique_voters
)
values ($1, $2, $3, $4, $5, $6, $7, $8)
on conflict (gauge_address, epoch_start) do update set
    vemezo_weight = $3,
    vebtc_weight = $4,
    boost_multiplier = $5,
    total_incentives_usd = $6,
    apy = $7,
    unique_voters = $8,
    recorded_at = now()
            ",
        )
        .bind(&snapshot.gauge_address)
        .bind(snapshot.epoch_start)
        .bind(&snapshot.vemezo_weight)
        .bind(&snapshot.vebtc_weight)
        .bind(snapshot.boost_multiplier)
        .bind(snapshot.total_incentives_usd)
        .bind(snapshot.apy)
        .bind(snapshot.unique_voters)
        .execute(&mut *tx)
        .await?;

        Ok(())
    }

    /// Gets every gauge snapshot recorded for an epoch
    pub async fn get_gauge_snapshots(&self, epoch_start: i64) -> SqlxResult<Vec<GaugeSnapshot>> {
        sqlx::query_as::<_, GaugeSnapshot>(
            "
select
    gauge_address,
    epoch_start,
    vemezo_weight,
    vebtc_weight,
    boost_multiplier,
    total_incentives_usd,
    apy,
    unique_voters
from gauge_history
where epoch_start = $1
order by gauge_address
            ",
        )
        .bind(epoch_start)
        .fetch_all(&self.pool)
        .await
    }
}

#[async_trait]
impl SnapshotStore for Database {
    /// Writes the whole batch in one transaction
    async fn upsert_snapshots(&self, rows: &[GaugeSnapshot]) -> Result<u64, StoreError> {
        let mut tx = self.start_transaction().await?;

        for snapshot in rows {
            self.upsert_gauge_snapshot(&mut tx, snapshot).await?;
        }

        tx.commit().await?;
        tracing::info!("upserted {} gauge snapshots", rows.len());

        Ok(rows.len() as u64)
    }
}
