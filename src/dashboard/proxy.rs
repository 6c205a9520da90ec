use axum::{
    body::Body,
    extract::{Path, RawQuery, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Forwards `/proxy/<path>?<query>` to API-Football with the server-side key
/// attached, so the key never reaches the browser.
pub struct UpstreamProxy {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl UpstreamProxy {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(UpstreamProxy {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn target_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}/{}?{}", self.base_url, path, q),
            _ => format!("{}/{}", self.base_url, path),
        }
    }
}

pub fn router(proxy: UpstreamProxy) -> Router {
    Router::new()
        .route("/proxy/*path", get(proxy_handler))
        .with_state(Arc::new(proxy))
}

/// Serve only the proxy route on an ephemeral loopback port, for runs that
/// never start the dashboard. Returns the base URL clients should use.
pub async fn spawn_local(proxy: UpstreamProxy) -> anyhow::Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(proxy)).await {
            warn!("Local proxy on {} stopped: {}", addr, e);
        }
    });
    debug!("Local proxy listening on {}", addr);
    Ok(format!("http://{}/proxy", addr))
}

/// GET /proxy/*path: relay upstream status and body verbatim.
async fn proxy_handler(
    State(proxy): State<Arc<UpstreamProxy>>,
    Path(path): Path<String>,
    RawQuery(query): RawQuery,
) -> Response {
    let url = proxy.target_url(&path, query.as_deref());
    debug!("Proxying {}", url);

    let upstream = proxy
        .http
        .get(&url)
        .header("x-apisports-key", &proxy.api_key)
        .header("accept", "application/json")
        .send()
        .await;

    let resp = match upstream {
        Ok(r) => r,
        Err(e) => {
            warn!("Proxy request to {} failed: {}", url, e);
            return proxy_error();
        }
    };

    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| HeaderValue::from_str(v).ok());

    let body = match resp.bytes().await {
        Ok(b) => b,
        Err(e) => {
            warn!("Proxy body from {} failed: {}", url, e);
            return proxy_error();
        }
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    if let Some(ct) = content_type {
        response.headers_mut().insert(header::CONTENT_TYPE, ct);
    }
    response
}

fn proxy_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "proxy_error" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client_for, serve};
    use axum::http::HeaderMap;
    use chrono::NaiveDate;
    use serde_json::Value;

    async fn upstream() -> String {
        let app = Router::new()
            .route(
                "/fixtures",
                get(|headers: HeaderMap, RawQuery(q): RawQuery| async move {
                    let key = headers
                        .get("x-apisports-key")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    Json(json!({ "key": key, "query": q }))
                }),
            )
            .route(
                "/odds",
                get(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
            );
        serve(app).await
    }

    #[tokio::test]
    async fn test_proxy_injects_key_and_forwards_query() {
        let base = upstream().await;
        let proxy = UpstreamProxy::new(&base, "secret", Duration::from_secs(5)).unwrap();
        let url = serve(router(proxy)).await;

        let resp = reqwest::get(format!("{}/proxy/fixtures?date=2025-10-20&status=NS", url))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["key"], "secret");
        assert_eq!(body["query"], "date=2025-10-20&status=NS");
    }

    #[tokio::test]
    async fn test_local_proxy_serves_client_fetches() {
        let upstream = Router::new().route(
            "/fixtures",
            get(|headers: HeaderMap| async move {
                if headers.get("x-apisports-key").and_then(|v| v.to_str().ok()) != Some("secret") {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "response": [] })));
                }
                (
                    StatusCode::OK,
                    Json(json!({ "response": [{
                        "fixture": { "id": 7, "date": "2025-10-20" },
                        "league": { "name": "Premier League", "country": "England" },
                        "teams": { "home": { "name": "A" }, "away": { "name": "B" } }
                    }]})),
                )
            }),
        );
        let base = serve(upstream).await;
        let proxy = UpstreamProxy::new(&base, "secret", Duration::from_secs(5)).unwrap();
        let proxy_base = spawn_local(proxy).await.unwrap();
        assert!(proxy_base.ends_with("/proxy"));

        let client = client_for(&proxy_base, "http://127.0.0.1:9/");
        let date = NaiveDate::from_ymd_opt(2025, 10, 20).unwrap();
        let fixtures = client.fetch_fixtures(date).await.unwrap();
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].id, 7);
    }

    #[tokio::test]
    async fn test_proxy_relays_rate_limit() {
        let base = upstream().await;
        let proxy = UpstreamProxy::new(&base, "secret", Duration::from_secs(5)).unwrap();
        let url = serve(router(proxy)).await;

        let resp = reqwest::get(format!("{}/proxy/odds?date=2025-10-20", url))
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 429);
        assert_eq!(resp.text().await.unwrap(), "slow down");
    }

    #[tokio::test]
    async fn test_proxy_transport_failure_is_server_error() {
        let proxy =
            UpstreamProxy::new("http://127.0.0.1:9", "secret", Duration::from_secs(2)).unwrap();
        let url = serve(router(proxy)).await;

        let resp = reqwest::get(format!("{}/proxy/fixtures", url)).await.unwrap();
        assert_eq!(resp.status().as_u16(), 500);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({ "error": "proxy_error" }));
    }
}
