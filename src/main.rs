use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod cache;
mod config;
mod dashboard;
mod db;
mod enrich;
mod error;
mod models;
mod presenter;
mod refresh;
mod sources;
#[cfg(test)]
mod test_support;
mod value;

use cache::ExpiringCache;
use config::Config;
use dashboard::{AppState, UpstreamProxy};
use presenter::render_text;
use refresh::{RefreshCoordinator, RefreshRequest, RefreshStatus};
use sources::{ClientSettings, RemoteDataClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    if config.sample {
        info!("Sample mode on: the built-in dataset is shown when live data fails");
    }

    let cache = ExpiringCache::open(&config.cache_path, Duration::from_secs(config.cache_ttl_secs));
    info!("Response cache ttl: {}s", cache.ttl().as_secs());

    let mut settings = ClientSettings::from_config(&config);
    if config.once {
        // No dashboard will be serving /proxy; stand one up for this run
        match &config.api_sports_key {
            Some(key) => {
                let proxy = upstream_proxy(&config, key)?;
                settings.proxy_base = dashboard::proxy::spawn_local(proxy).await?;
                info!("One-shot run via local proxy {}", settings.proxy_base);
            }
            None => warn!(
                "API_SPORTS_KEY not set; --once relies on a proxy already running at {}",
                config.proxy_url
            ),
        }
    }

    let client = Arc::new(RemoteDataClient::new(settings, cache)?);
    let season = client.season().to_string();
    info!("xG season: {}", season);
    let coordinator = Arc::new(RefreshCoordinator::new(client.clone(), client, &season));

    if config.once {
        return run_once(&config, &coordinator).await;
    }

    let proxy = match &config.api_sports_key {
        Some(key) => {
            info!("Upstream proxy enabled at /proxy -> {}", config.api_sports_url);
            Some(upstream_proxy(&config, key)?)
        }
        None => {
            info!("API_SPORTS_KEY not set; /proxy route disabled");
            None
        }
    };

    let state = AppState {
        coordinator,
        sample_default: config.sample,
    };
    let app = dashboard::router(state, proxy);
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("Dashboard listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run dashboard server (blocks until shutdown)
    axum::serve(listener, app).await?;

    Ok(())
}

fn upstream_proxy(config: &Config, key: &str) -> Result<UpstreamProxy> {
    UpstreamProxy::new(
        &config.api_sports_url,
        key,
        Duration::from_secs(config.request_timeout_secs),
    )
}

/// Single refresh from the command line, printed as text.
async fn run_once(config: &Config, coordinator: &RefreshCoordinator) -> Result<()> {
    let req = RefreshRequest {
        date: config.date.unwrap_or_else(|| Utc::now().date_naive()),
        min_value: config.min_value,
        league: config.league_filter()?,
        use_sample: config.sample,
    };
    let outcome = coordinator.refresh(req).await;

    match &outcome.status {
        RefreshStatus::Failed { message } => anyhow::bail!("refresh failed: {}", message),
        RefreshStatus::SampleFallback { message } => {
            println!("Live data unavailable ({}); showing sample data\n", message)
        }
        RefreshStatus::Live { fixtures } => {
            println!("{}: {} fixtures\n", outcome.date, fixtures)
        }
    }
    if let Some(presentation) = &outcome.presentation {
        print!("{}", render_text(presentation));
    }
    Ok(())
}
