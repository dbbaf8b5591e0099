use async_trait::async_trait;

use super::models::GaugeSnapshot;
use super::store::{SnapshotStore, StoreError, CONFLICT_KEY};

const TABLE: &str = "gauge_history";

/// Writes snapshots through a Supabase project's PostgREST endpoint
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, service_role_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Table URL with the upsert conflict target
    pub fn upsert_url(&self) -> String {
        format!(
            "{}/rest/v1/{}?on_conflict={}",
            self.base_url, TABLE, CONFLICT_KEY
        )
    }
}

#[async_trait]
impl SnapshotStore for SupabaseStore {
    async fn upsert_snapshots(&self, rows: &[GaugeSnapshot]) -> Result<u64, StoreError> {
        let response = self
            .client
            .post(self.upsert_url())
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(rows)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                "supabase rejected gauge history upsert: {} {}",
                status,
                body
            );
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!("upserted {} gauge snapshots to supabase", rows.len());

        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_upsert_url() {
        let store = SupabaseStore::new("https://project.supabase.co/", "key");
        assert_eq!(
            store.upsert_url(),
            "https://project.supabase.co/rest/v1/gauge_history?on_conflict=gauge_address,epoch_start"
        );
    }

    #[test]
    fn rows_serialize_every_key() {
        let row = GaugeSnapshot {
            gauge_address: "0xabc".to_string(),
            epoch_start: 1_209_600,
            vemezo_weight: "1000000000000000000".parse().unwrap(),
            vebtc_weight: None,
            boost_multiplier: None,
            total_incentives_usd: Some(22.0),
            apy: None,
            unique_voters: None,
        };

        let json = serde_json::to_value(&row).unwrap();
        let object = json.as_object().unwrap();

        assert_eq!(object.len(), 8);
        assert!(object["vebtc_weight"].is_null());
        assert!(object["unique_voters"].is_null());
        assert_eq!(object["vemezo_weight"], "1000000000000000000");
        assert_eq!(object["epoch_start"], 1_209_600);
    }
}
