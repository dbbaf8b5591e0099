pub mod database;
pub mod memory;
pub mod models;
pub mod store;
pub mod supabase;

pub use crate::database::Database;
pub use crate::memory::MemoryStore;
pub use crate::models::GaugeSnapshot;
pub use crate::store::{SnapshotStore, StoreError};
pub use crate::supabase::SupabaseStore;
