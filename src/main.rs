use clap::Parser; // for cli
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shortlink_gateway::config::Args;
use shortlink_gateway::error::StartupError;
use shortlink_gateway::geo::GeoLocator;
use shortlink_gateway::models::ClickJob;
use shortlink_gateway::rate_limit::{RateLimiter, spawn_sweeper};
use shortlink_gateway::router;
use shortlink_gateway::state::AppState;
use shortlink_gateway::store::{PgStore, Store, create_pool};
use shortlink_gateway::worker::click_worker;

// this is main async function with tokio
#[tokio::main]
async fn main() -> Result<(), StartupError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // parse cli arguments
    let args = Args::parse();
    args.validate()?;

    let store = match args.database_url() {
        Some(url) => {
            let store = PgStore::new(create_pool(url).await?);
            store.migrate().await?;
            info!("connected to postgres, migrations applied");
            Store::Postgres(store)
        }
        None => {
            info!("no database configured, links are kept in memory");
            Store::memory()
        }
    };
    let store = Arc::new(store);
    let limiter = Arc::new(RateLimiter::new(args.rate_limit, args.rate_window()));
    let (click_tx, click_rx) = mpsc::channel::<ClickJob>(args.click_queue);

    // spawn the background workers
    let geo = if args.no_geo {
        GeoLocator::disabled()
    } else {
        GeoLocator::new(reqwest::Client::new(), &args.geo_url)
    };
    tokio::spawn(click_worker(click_rx, Arc::clone(&store), geo));

    if let Some(every) = args.sweep_interval() {
        spawn_sweeper(Arc::clone(&limiter), every);
    }

    info!(
        limit = limiter.limit(),
        window = ?limiter.window(),
        sweep_secs = args.sweep_interval,
        "rate limiter configured"
    );

    let state = Arc::new(AppState {
        store,
        limiter,
        click_tx,
        base_url: args.public_base_url(),
    });
    let app = router::build(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(%addr, "shortlink gateway listening");
    info!(base_url = %args.public_base_url(), "short links use base url");
    if args.no_geo {
        info!("geolocation disabled");
    } else {
        info!(geo_url = %args.geo_url, "geolocation enabled");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("shortlink gateway stopped");
    Ok(())
}

// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl+c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl+c, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
