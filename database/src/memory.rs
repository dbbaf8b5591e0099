use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::models::GaugeSnapshot;
use super::store::{SnapshotStore, StoreError};

/// In-process store keyed on `(gauge_address, epoch_start)`
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<(String, i64), GaugeSnapshot>>,
    writes: Mutex<u64>,
    reject_with: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses every write with `reason`
    pub fn rejecting(reason: &str) -> Self {
        Self {
            reject_with: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Stored rows ordered by key
    pub async fn rows(&self) -> Vec<GaugeSnapshot> {
        self.rows.lock().await.values().cloned().collect()
    }

    pub async fn get(&self, gauge_address: &str, epoch_start: i64) -> Option<GaugeSnapshot> {
        self.rows
            .lock()
            .await
            .get(&(gauge_address.to_string(), epoch_start))
            .cloned()
    }

    /// Number of upsert calls that reached the store
    pub async fn write_count(&self) -> u64 {
        *self.writes.lock().await
    }
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn upsert_snapshots(&self, rows: &[GaugeSnapshot]) -> Result<u64, StoreError> {
        if let Some(reason) = &self.reject_with {
            return Err(StoreError::Rejected {
                status: 500,
                body: reason.clone(),
            });
        }

        let mut stored = self.rows.lock().await;
        for row in rows {
            let (gauge_address, epoch_start) = row.key();
            stored.insert((gauge_address.to_string(), epoch_start), row.clone());
        }
        *self.writes.lock().await += 1;

        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::BigDecimal;

    fn snapshot(gauge_address: &str, epoch_start: i64, weight: u64) -> GaugeSnapshot {
        GaugeSnapshot {
            gauge_address: gauge_address.to_string(),
            epoch_start,
            vemezo_weight: BigDecimal::from(weight),
            vebtc_weight: None,
            boost_multiplier: None,
            total_incentives_usd: None,
            apy: None,
            unique_voters: None,
        }
    }

    #[tokio::test]
    async fn upsert_replaces_same_key() {
        let store = MemoryStore::new();

        store
            .upsert_snapshots(&[snapshot("0xa", 0, 1), snapshot("0xb", 0, 1)])
            .await
            .unwrap();
        store
            .upsert_snapshots(&[snapshot("0xa", 0, 7), snapshot("0xa", 604_800, 9)])
            .await
            .unwrap();

        assert_eq!(store.rows().await.len(), 3);
        assert_eq!(
            store.get("0xa", 0).await.unwrap().vemezo_weight,
            BigDecimal::from(7)
        );
        assert_eq!(store.write_count().await, 2);
    }

    #[tokio::test]
    async fn rejecting_store_fails() {
        let store = MemoryStore::rejecting("offline");
        let result = store.upsert_snapshots(&[snapshot("0xa", 0, 1)]).await;

        assert!(matches!(result, Err(StoreError::Rejected { .. })));
        assert!(store.rows().await.is_empty());
    }
}
