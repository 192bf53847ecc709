//! Storage for short links and their click history.
//!
//! Two backends sit behind [`Store`]: Postgres through sqlx when a database
//! url is configured, and an in-memory DashMap otherwise.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::{MIGRATOR, PgStore, create_pool};

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::error::StoreError;
use crate::models::{ClickEvent, ClickJob, ShortUrl};

pub const UNKNOWN_COUNTRY_LABEL: &str = "Unknown";

// Aggregated clicks for one short link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClickStats {
    pub total_clicks: u64,
    pub unique_ips: u64,
    pub clicks_by_country: BTreeMap<String, u64>,
}

// A blank country is reported as "Unknown"
fn country_label(country: &str) -> String {
    if country.is_empty() {
        UNKNOWN_COUNTRY_LABEL.to_string()
    } else {
        country.to_string()
    }
}

#[derive(Debug)]
pub enum Store {
    Memory(MemoryStore),
    Postgres(PgStore),
}

impl Store {
    pub fn memory() -> Self {
        Store::Memory(MemoryStore::new())
    }

    pub fn backend(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Postgres(_) => "postgres",
        }
    }

    /// Inserts a new link; fails with [`StoreError::CodeTaken`] if `code` is
    /// already in use.
    pub async fn insert_url(
        &self,
        code: &str,
        original_url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShortUrl, StoreError> {
        match self {
            Store::Memory(store) => store.insert_url(code, original_url, expires_at),
            Store::Postgres(store) => store.insert_url(code, original_url, expires_at).await,
        }
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, StoreError> {
        match self {
            Store::Memory(store) => Ok(store.find_by_code(code)),
            Store::Postgres(store) => store.find_by_code(code).await,
        }
    }

    pub async fn record_click(&self, job: ClickJob, country: String) -> Result<ClickEvent, StoreError> {
        match self {
            Store::Memory(store) => Ok(store.record_click(job, country)),
            Store::Postgres(store) => store.record_click(job, country).await,
        }
    }

    pub async fn clicks_for(&self, short_url_id: u64) -> Result<Vec<ClickEvent>, StoreError> {
        match self {
            Store::Memory(store) => Ok(store.clicks_for(short_url_id)),
            Store::Postgres(store) => store.clicks_for(short_url_id).await,
        }
    }

    pub async fn stats(&self, short_url_id: u64) -> Result<ClickStats, StoreError> {
        match self {
            Store::Memory(store) => Ok(store.stats(short_url_id)),
            Store::Postgres(store) => store.stats(short_url_id).await,
        }
    }

    // Liveness of the backing storage
    pub async fn ping(&self) -> Result<(), StoreError> {
        match self {
            Store::Memory(_) => Ok(()),
            Store::Postgres(store) => store.ping().await,
        }
    }
}
