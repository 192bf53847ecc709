//! Postgres backend over an sqlx pool.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::time::Duration;

use super::{ClickStats, country_label};
use crate::error::StoreError;
use crate::models::{ClickEvent, ClickJob, ShortUrl};

// Schema for short_urls and click_events, applied at startup
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

type ShortUrlRow = (i64, String, String, DateTime<Utc>, Option<DateTime<Utc>>);
type ClickRow = (i64, i64, DateTime<Utc>, String, String, String);

const SHORT_URL_COLUMNS: &str = "id, code, original_url, created_at, expires_at";
const CLICK_COLUMNS: &str = "id, short_url_id, clicked_at, ip_address, user_agent, country";

/// Create a PostgreSQL connection pool.
///
/// Disables the `extra_float_digits` startup parameter for PgBouncer compatibility.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let connect_options: PgConnectOptions = database_url
        .parse::<PgConnectOptions>()?
        .extra_float_digits(None);

    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(connect_options)
        .await
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    // The unique index on code decides races; a violation is a taken code
    pub async fn insert_url(
        &self,
        code: &str,
        original_url: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<ShortUrl, StoreError> {
        let row = sqlx::query_as::<_, ShortUrlRow>(&format!(
            "INSERT INTO short_urls (code, original_url, expires_at) VALUES ($1, $2, $3) RETURNING {SHORT_URL_COLUMNS}"
        ))
        .bind(code)
        .bind(original_url)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                StoreError::CodeTaken(code.to_string())
            }
            _ => StoreError::Database(e),
        })?;

        Ok(short_url_from_row(row))
    }

    pub async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, StoreError> {
        let row = sqlx::query_as::<_, ShortUrlRow>(&format!(
            "SELECT {SHORT_URL_COLUMNS} FROM short_urls WHERE code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(short_url_from_row))
    }

    pub async fn record_click(&self, job: ClickJob, country: String) -> Result<ClickEvent, StoreError> {
        let row = sqlx::query_as::<_, ClickRow>(&format!(
            "INSERT INTO click_events (short_url_id, clicked_at, ip_address, user_agent, country) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {CLICK_COLUMNS}"
        ))
        .bind(job.short_url_id as i64)
        .bind(job.clicked_at)
        .bind(&job.ip_address)
        .bind(&job.user_agent)
        .bind(&country)
        .fetch_one(&self.pool)
        .await?;

        Ok(click_from_row(row))
    }

    pub async fn clicks_for(&self, short_url_id: u64) -> Result<Vec<ClickEvent>, StoreError> {
        let rows = sqlx::query_as::<_, ClickRow>(&format!(
            "SELECT {CLICK_COLUMNS} FROM click_events WHERE short_url_id = $1 ORDER BY id"
        ))
        .bind(short_url_id as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(click_from_row).collect())
    }

    pub async fn stats(&self, short_url_id: u64) -> Result<ClickStats, StoreError> {
        let (total, unique) = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COUNT(DISTINCT ip_address) FROM click_events WHERE short_url_id = $1",
        )
        .bind(short_url_id as i64)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT country, COUNT(*) FROM click_events WHERE short_url_id = $1 GROUP BY country",
        )
        .bind(short_url_id as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(stats_from_rows(total, unique, rows))
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn short_url_from_row((id, code, original_url, created_at, expires_at): ShortUrlRow) -> ShortUrl {
    ShortUrl {
        id: id as u64,
        code,
        original_url,
        created_at,
        expires_at,
    }
}

fn click_from_row((id, short_url_id, clicked_at, ip_address, user_agent, country): ClickRow) -> ClickEvent {
    ClickEvent {
        id: id as u64,
        short_url_id: short_url_id as u64,
        clicked_at,
        ip_address,
        user_agent,
        country,
    }
}

fn stats_from_rows(total: i64, unique: i64, by_country: Vec<(String, i64)>) -> ClickStats {
    let mut stats = ClickStats {
        total_clicks: total as u64,
        unique_ips: unique as u64,
        ..ClickStats::default()
    };
    // "" and a literal "Unknown" row land on the same label
    for (country, count) in by_country {
        *stats.clicks_by_country.entry(country_label(&country)).or_insert(0) += count as u64;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::UNKNOWN_COUNTRY_LABEL;

    #[test]
    fn test_migrations_cover_both_tables() {
        let sql: Vec<_> = MIGRATOR.iter().map(|m| m.sql.to_string()).collect();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].contains("CREATE TABLE IF NOT EXISTS short_urls"));
        assert!(sql[0].contains("code         VARCHAR(16) NOT NULL UNIQUE"));
        assert!(sql[1].contains("CREATE TABLE IF NOT EXISTS click_events"));
    }

    #[test]
    fn test_stats_from_rows_merges_blank_country() {
        let stats = stats_from_rows(
            5,
            3,
            vec![
                ("US".to_string(), 2),
                (String::new(), 1),
                (UNKNOWN_COUNTRY_LABEL.to_string(), 1),
                ("--".to_string(), 1),
            ],
        );

        assert_eq!(stats.total_clicks, 5);
        assert_eq!(stats.unique_ips, 3);
        assert_eq!(stats.clicks_by_country.get("US"), Some(&2));
        assert_eq!(stats.clicks_by_country.get(UNKNOWN_COUNTRY_LABEL), Some(&2));
        assert_eq!(stats.clicks_by_country.get("--"), Some(&1));
    }

    #[test]
    fn test_row_conversion() {
        let now = Utc::now();
        let url = short_url_from_row((7, "abc".into(), "https://example.com".into(), now, None));
        assert_eq!(url.id, 7);
        assert_eq!(url.code, "abc");

        let click = click_from_row((3, 7, now, "8.8.8.8".into(), "curl".into(), "US".into()));
        assert_eq!(click.short_url_id, 7);
        assert_eq!(click.country, "US");
    }

    // Runs against a real database: TEST_DATABASE_URL=postgres://... cargo test -- --ignored
    #[tokio::test]
    #[ignore = "needs TEST_DATABASE_URL"]
    async fn test_postgres_round_trip() {
        let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
        let store = PgStore::new(create_pool(&url).await.unwrap());
        store.migrate().await.unwrap();
        store.ping().await.unwrap();

        let code = format!("t{}", Utc::now().timestamp_micros() % 1_000_000_000);
        let short = store.insert_url(&code, "https://example.com", None).await.unwrap();
        assert!(matches!(
            store.insert_url(&code, "https://other.example", None).await,
            Err(StoreError::CodeTaken(_))
        ));
        assert_eq!(store.find_by_code(&code).await.unwrap(), Some(short.clone()));

        let job = ClickJob {
            short_url_id: short.id,
            ip_address: "8.8.8.8".into(),
            user_agent: "test".into(),
            clicked_at: Utc::now(),
        };
        store.record_click(job, String::new()).await.unwrap();

        let stats = store.stats(short.id).await.unwrap();
        assert_eq!(stats.total_clicks, 1);
        assert_eq!(stats.clicks_by_country.get(UNKNOWN_COUNTRY_LABEL), Some(&1));
        assert_eq!(store.clicks_for(short.id).await.unwrap().len(), 1);
    }
}
