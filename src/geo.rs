use std::net::IpAddr;
use tokio::time::Duration;

// Recorded when the country cannot be determined
pub const UNKNOWN_COUNTRY: &str = "--";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(1);

/// Resolves client IPs to two-letter country codes over HTTP.
///
/// Queries `{base_url}/{ip}/country/` (the ipapi.co layout). Every failure
/// path yields [`UNKNOWN_COUNTRY`] rather than an error.
#[derive(Clone, Debug)]
pub struct GeoLocator {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl GeoLocator {
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: Some(base_url.trim_end_matches('/').to_string()),
        }
    }

    // Never calls out, every lookup is unknown
    pub fn disabled() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: None,
        }
    }

    pub async fn lookup_country(&self, ip: &str) -> String {
        let Some(base_url) = &self.base_url else {
            return UNKNOWN_COUNTRY.to_string();
        };
        if !is_routable(ip) {
            return UNKNOWN_COUNTRY.to_string();
        }

        let url = format!("{}/{}/country/", base_url, ip);
        let body = match self.client.get(&url).timeout(LOOKUP_TIMEOUT).send().await {
            Ok(res) if res.status().is_success() => res.text().await,
            Ok(res) => {
                tracing::debug!(ip, status = %res.status(), "geo lookup rejected");
                return UNKNOWN_COUNTRY.to_string();
            }
            Err(e) => {
                tracing::debug!(ip, error = %e, "geo lookup failed");
                return UNKNOWN_COUNTRY.to_string();
            }
        };

        body.ok()
            .and_then(|text| parse_country(&text))
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string())
    }
}

fn parse_country(body: &str) -> Option<String> {
    let country = body.trim();
    (country.len() == 2).then(|| country.to_string())
}

// Only public unicast addresses are worth asking about
fn is_routable(ip: &str) -> bool {
    match ip.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        Ok(IpAddr::V6(v6)) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00 // unique local
                || (first & 0xffc0) == 0xfe80) // link local
        }
        Err(_) => false,
    }
}
