//! # CORS Relay
//!
//! A small HTTP server that fetches allow-listed audio URLs on behalf of a
//! client and answers with permissive cross-origin headers. Range requests
//! are forwarded so that players can seek inside relayed files.
//!
//! ## Endpoints
//!
//! | Path | Description |
//! |------|-------------|
//! | `/debug` | Liveness check |
//! | `/?url=<u>` | Relays `GET`/`HEAD` of `u` |
//!
//! Every response, including errors, carries `Access-Control-Allow-Origin: *`.

pub mod policy;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::config::RelayConfig;
pub use policy::RelayPolicy;

/// Shared state passed to all request handlers.
#[derive(Clone)]
struct RelayState {
    client: reqwest::Client,
    policy: Arc<RelayPolicy>,
}

#[derive(Debug, Deserialize)]
struct RelayParams {
    url: Option<String>,
}

fn text_response(status: StatusCode, body: String) -> Response {
    (
        status,
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        body,
    )
        .into_response()
}

fn preflight() -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, policy::ALLOW_METHODS),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, policy::ALLOW_HEADERS),
            (header::ACCESS_CONTROL_MAX_AGE, policy::PREFLIGHT_MAX_AGE),
        ],
    )
        .into_response()
}

/// Builds the relay router.
pub fn router(policy: RelayPolicy, client: reqwest::Client) -> Router {
    let state = RelayState {
        client,
        policy: Arc::new(policy),
    };

    Router::new()
        .route("/debug", any(handle_debug))
        .fallback(handle_relay)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Handles requests to `/debug`.
async fn handle_debug() -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (
                header::HeaderName::from_static("x-relay-version"),
                env!("CARGO_PKG_VERSION"),
            ),
        ],
        "Relay is running!",
    )
        .into_response()
}

/// Handles every other request: preflight, validation and the upstream fetch.
async fn handle_relay(
    State(state): State<RelayState>,
    method: Method,
    headers: HeaderMap,
    params: Result<Query<RelayParams>, QueryRejection>,
) -> Response {
    if method == Method::OPTIONS {
        return preflight();
    }

    if method != Method::GET && method != Method::HEAD {
        return text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            format!("Method {method} not allowed. Use GET or HEAD."),
        );
    }

    let Some(url) = params.ok().and_then(|Query(p)| p.url).filter(|u| !u.is_empty()) else {
        return text_response(
            StatusCode::BAD_REQUEST,
            "Missing url parameter. Usage: ?url=https://github.com/...".to_string(),
        );
    };

    if !state.policy.is_allowed(&url) {
        tracing::warn!("Rejected relay request for {url}");
        return text_response(
            StatusCode::FORBIDDEN,
            "Invalid URL. Only allow-listed release URLs are relayed.".to_string(),
        );
    }

    let mut request = state.client.request(method.clone(), &url);
    if let Some(range) = headers.get(header::RANGE) {
        request = request.header(header::RANGE, range.clone());
    }

    let upstream = match request.send().await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::error!("Relay fetch of {url} failed: {e}");
            return text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Proxy error: {e}"),
            );
        }
    };

    let status = upstream.status();
    if !status.is_success() {
        tracing::debug!("Upstream {url} answered {status}");
        return text_response(
            status,
            format!(
                "Upstream error: {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or_default()
            )
            .trim_end()
            .to_string(),
        );
    }

    let response_headers = state.policy.response_headers(upstream.headers());
    let body = if method == Method::HEAD {
        Body::empty()
    } else {
        Body::from_stream(upstream.bytes_stream())
    };

    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

/// Runs the relay until Ctrl-C.
///
/// # Errors
/// - If the allow pattern is invalid
/// - If the bind address cannot be parsed or bound
pub async fn serve(config: &RelayConfig) -> anyhow::Result<()> {
    let policy = RelayPolicy::from_config(config)?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("unjazz-relay/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind relay to {}: {e}", config.bind))?;
    let addr = listener.local_addr()?;
    tracing::info!("Relay listening on http://{addr}");
    println!("Relay listening on http://{addr} (Ctrl-C to stop)");

    axum::serve(listener, router(policy, client))
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {e}");
            }
        })
        .await?;

    tracing::info!("Relay stopped");
    Ok(())
}
