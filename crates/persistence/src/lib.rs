//! Persistence layer for the dialwave call platform
//!
//! Store traits per entity with two implementations:
//! - ScyllaDB-backed stores for production
//! - In-memory stores for development fallback and tests

pub mod client;
pub mod error;
pub mod memory;
pub mod schema;
pub mod scylla_store;
pub mod store;

use std::sync::Arc;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use memory::{
    InMemoryCallStore, InMemoryCampaignStore, InMemoryContactStore, InMemoryDncStore,
    InMemoryQualificationStore, InMemoryTurnStore,
};
pub use store::{
    CallStore, CampaignStore, ContactStore, DncStore, QualificationStore, TurnStore,
};

/// Combined persistence layer with all entity stores
#[derive(Clone)]
pub struct PersistenceLayer {
    pub campaigns: Arc<dyn CampaignStore>,
    pub contacts: Arc<dyn ContactStore>,
    pub calls: Arc<dyn CallStore>,
    pub turns: Arc<dyn TurnStore>,
    pub qualifications: Arc<dyn QualificationStore>,
    pub dnc: Arc<dyn DncStore>,
}

impl PersistenceLayer {
    /// In-memory stores; state is lost on restart
    pub fn in_memory() -> Self {
        Self {
            campaigns: Arc::new(InMemoryCampaignStore::new()),
            contacts: Arc::new(InMemoryContactStore::new()),
            calls: Arc::new(InMemoryCallStore::new()),
            turns: Arc::new(InMemoryTurnStore::new()),
            qualifications: Arc::new(InMemoryQualificationStore::new()),
            dnc: Arc::new(InMemoryDncStore::new()),
        }
    }

    /// Connect to ScyllaDB and ensure the schema exists
    pub async fn scylla(config: ScyllaConfig) -> Result<Self, PersistenceError> {
        let client = ScyllaClient::connect(config).await?;
        client.ensure_schema().await?;

        Ok(Self {
            campaigns: Arc::new(scylla_store::ScyllaCampaignStore::new(client.clone())),
            contacts: Arc::new(scylla_store::ScyllaContactStore::new(client.clone())),
            calls: Arc::new(scylla_store::ScyllaCallStore::new(client.clone())),
            turns: Arc::new(scylla_store::ScyllaTurnStore::new(client.clone())),
            qualifications: Arc::new(scylla_store::ScyllaQualificationStore::new(client.clone())),
            dnc: Arc::new(scylla_store::ScyllaDncStore::new(client)),
        })
    }
}
