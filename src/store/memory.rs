//! In-memory backend, used when no database is configured.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use super::{ClickStats, country_label};
use crate::error::StoreError;
use crate::models::{ClickEvent, ClickJob, ShortUrl};

#[derive(Debug)]
pub struct MemoryStore {
    urls: DashMap<String, ShortUrl>,      // code -> link
    clicks: DashMap<u64, Vec<ClickEvent>>, // short url id -> events
    next_url_id: AtomicU64,
    next_click_id: AtomicU64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            urls: DashMap::new(),
            clicks: DashMap::new(),
            next_url_id: AtomicU64::new(1),
            next_click_id: AtomicU64::new(1),
        }
    }

    /// Inserts a new link under `code`. The existence check and the insert
    /// happen under the same shard lock, so two racing inserts for one code
    /// cannot both succeed.
    pub fn insert_url(
        &self,
        code: &str,
        original_url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShortUrl, StoreError> {
        match self.urls.entry(code.to_string()) {
            Entry::Occupied(_) => Err(StoreError::CodeTaken(code.to_string())),
            Entry::Vacant(slot) => {
                let url = ShortUrl {
                    id: self.next_url_id.fetch_add(1, Ordering::Relaxed),
                    code: code.to_string(),
                    original_url: original_url.to_string(),
                    created_at: Utc::now(),
                    expires_at,
                };
                slot.insert(url.clone());
                Ok(url)
            }
        }
    }

    pub fn find_by_code(&self, code: &str) -> Option<ShortUrl> {
        self.urls.get(code).map(|entry| entry.clone())
    }

    pub fn record_click(&self, job: ClickJob, country: String) -> ClickEvent {
        let event = ClickEvent {
            id: self.next_click_id.fetch_add(1, Ordering::Relaxed),
            short_url_id: job.short_url_id,
            clicked_at: job.clicked_at,
            ip_address: job.ip_address,
            user_agent: job.user_agent,
            country,
        };

        self.clicks
            .entry(event.short_url_id)
            .or_default()
            .push(event.clone());
        event
    }

    pub fn clicks_for(&self, short_url_id: u64) -> Vec<ClickEvent> {
        self.clicks
            .get(&short_url_id)
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn stats(&self, short_url_id: u64) -> ClickStats {
        let Some(events) = self.clicks.get(&short_url_id) else {
            return ClickStats::default();
        };

        let mut unique = HashSet::new();
        let mut stats = ClickStats::default();
        for event in events.iter() {
            unique.insert(event.ip_address.as_str());
            *stats
                .clicks_by_country
                .entry(country_label(&event.country))
                .or_insert(0) += 1;
        }

        stats.total_clicks = events.len() as u64;
        stats.unique_ips = unique.len() as u64;
        stats
    }

    pub fn url_count(&self) -> usize {
        self.urls.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UNKNOWN_COUNTRY_LABEL;
    use std::sync::Arc;
    use std::thread;

    fn job(id: u64, ip: &str) -> ClickJob {
        ClickJob {
            short_url_id: id,
            ip_address: ip.to_string(),
            user_agent: "curl/8.0".to_string(),
            clicked_at: Utc::now(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let store = MemoryStore::new();
        let url = store.insert_url("abc", "https://example.com", None).unwrap();

        assert_eq!(url.id, 1);
        assert_eq!(store.find_by_code("abc"), Some(url));
        assert!(store.find_by_code("missing").is_none());
    }

    #[test]
    fn test_duplicate_code_rejected() {
        let store = MemoryStore::new();
        store.insert_url("abc", "https://a.example", None).unwrap();

        let err = store.insert_url("abc", "https://b.example", None).unwrap_err();
        assert!(matches!(err, StoreError::CodeTaken(code) if code == "abc"));
        assert_eq!(store.find_by_code("abc").unwrap().original_url, "https://a.example");
    }

    #[test]
    fn test_racing_inserts_single_winner() {
        let store = Arc::new(MemoryStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.insert_url("race", &format!("https://{i}.example"), None).is_ok())
            })
            .collect();

        let winners = handles.into_iter().map(|h| h.join().unwrap()).filter(|ok| *ok).count();
        assert_eq!(winners, 1);
        assert_eq!(store.url_count(), 1);
    }

    #[test]
    fn test_stats() {
        let store = MemoryStore::new();
        let url = store.insert_url("abc", "https://example.com", None).unwrap();
        let other = store.insert_url("def", "https://example.org", None).unwrap();

        store.record_click(job(url.id, "1.1.1.1"), "US".into());
        store.record_click(job(url.id, "1.1.1.1"), "US".into());
        store.record_click(job(url.id, "2.2.2.2"), "--".into());
        store.record_click(job(url.id, "3.3.3.3"), String::new());
        store.record_click(job(other.id, "9.9.9.9"), "RO".into());

        let stats = store.stats(url.id);
        assert_eq!(stats.total_clicks, 4);
        assert_eq!(stats.unique_ips, 3);
        assert_eq!(stats.clicks_by_country.get("US"), Some(&2));
        assert_eq!(stats.clicks_by_country.get("--"), Some(&1));
        assert_eq!(stats.clicks_by_country.get(UNKNOWN_COUNTRY_LABEL), Some(&1));
        assert!(!stats.clicks_by_country.contains_key("RO"));
    }

    #[test]
    fn test_stats_without_clicks() {
        let store = MemoryStore::new();
        let url = store.insert_url("abc", "https://example.com", None).unwrap();
        assert_eq!(store.stats(url.id), ClickStats::default());
        assert!(store.clicks_for(url.id).is_empty());
    }
}
