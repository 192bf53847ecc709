use std::sync::Arc;
use tokio::sync::mpsc;
use crate::models::ClickJob;
use crate::rate_limit::RateLimiter;
use crate::store::Store;
// app's shared state

pub struct AppState {
    pub store: Arc<Store>,
    pub limiter: Arc<RateLimiter>,        // shared by every route
    pub click_tx: mpsc::Sender<ClickJob>, // feeds the click worker
    pub base_url: String,                 // no trailing slash
}

impl AppState {
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }
}
