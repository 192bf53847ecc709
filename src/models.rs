use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Stored short link
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortUrl {
    pub id: u64,
    pub code: String,
    pub original_url: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl ShortUrl {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now > expires)
    }
}

// One recorded redirect
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClickEvent {
    pub id: u64,
    pub short_url_id: u64,
    pub clicked_at: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: String,
    pub country: String,
}

// Click handed from the redirect handler to the worker
#[derive(Debug, Clone)]
pub struct ClickJob {
    pub short_url_id: u64,
    pub ip_address: String, // client key, port stripped
    pub user_agent: String,
    pub clicked_at: DateTime<Utc>,
}

// POST /shorten body
#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub short_url: String,
    pub code: String,
}

// ?code=... for analytics and qr
#[derive(Debug, Deserialize)]
pub struct CodeQuery {
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyticsResponse {
    pub code: String,
    pub original_url: String,
    pub total_clicks: u64,
    pub unique_ips: u64,
    pub clicks_by_country: BTreeMap<String, u64>,
}
