//! Helpers shared by the async test suites: a throwaway local HTTP server
//! standing in for the upstreams, and a client wired to it.

use axum::Router;
use std::time::Duration;

use crate::cache::ExpiringCache;
use crate::sources::{ClientSettings, RemoteDataClient};

/// Serve `router` on an ephemeral local port; returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("test listener address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });
    format!("http://{}", addr)
}

pub fn settings(proxy_base: &str, stats_base: &str) -> ClientSettings {
    ClientSettings {
        proxy_base: proxy_base.to_string(),
        stats_base: stats_base.to_string(),
        season: "2024".to_string(),
        max_retries: 2,
        retry_delay: Duration::from_millis(5),
        odds_max_pages: 3,
        request_timeout: Duration::from_secs(5),
    }
}

/// Client with a fresh in-memory cache and a short retry delay.
pub fn client_for(proxy_base: &str, stats_base: &str) -> RemoteDataClient {
    RemoteDataClient::new(
        settings(proxy_base, stats_base),
        ExpiringCache::memory_only(Duration::from_secs(300)),
    )
    .expect("test client")
}
