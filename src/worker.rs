use std::sync::Arc;
use tokio::sync::mpsc;

use crate::geo::GeoLocator;
use crate::metrics::CLICKS_RECORDED;
use crate::models::ClickJob;
use crate::store::Store;

// Background worker -> geolocates and stores clicks one by one, off the redirect path
pub async fn click_worker(
    mut rx: mpsc::Receiver<ClickJob>,
    store: Arc<Store>,
    geo: GeoLocator,
) {
    tracing::info!("click worker started");

    // keep receiving clicks until every sender is gone
    while let Some(job) = rx.recv().await {
        let country = geo.lookup_country(&job.ip_address).await;
        let short_url_id = job.short_url_id;
        match store.record_click(job, country).await {
            Ok(event) => {
                CLICKS_RECORDED.inc();
                tracing::debug!(
                    short_url_id = event.short_url_id,
                    ip = %event.ip_address,
                    country = %event.country,
                    "click recorded"
                );
            }
            Err(e) => tracing::warn!(short_url_id, error = %e, "failed to save click event"),
        }
    }

    tracing::info!("click worker stopped");
}
