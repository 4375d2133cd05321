//! Observability setup: structured logging, Prometheus metrics and the admin
//! HTTP server.
//!
//! The admin server answers:
//! - `GET /health/live`
//! - `GET /health/ready` (database round trip when Postgres is configured)
//! - `GET /metrics`
//! - `GET /webhook/setup?secret=...` (registers the webhook and bot commands)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use hyper::server::conn::http1;
use hyper::{Method, Response, StatusCode};
use hyper_util::rt::TokioIo;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;

use crate::errors::AppResult;
use crate::observability_config::ObservabilityConfig;

/// Initialize structured logging with tracing and configuration
pub fn init_tracing_with_config(config: &ObservabilityConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("taxi_bot={}", config.log_level).parse()?)
        .add_directive("sqlx=warn".parse()?)
        .add_directive("teloxide=warn".parse()?);

    // Pretty for development, JSON everywhere else
    if config.is_development()
        || std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string()) == "pretty"
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    }

    tracing::info!(
        environment = %config.environment,
        log_level = %config.log_level,
        "Tracing initialized with structured logging"
    );
    Ok(())
}

/// Install the Prometheus recorder; `None` when export is disabled
pub fn init_metrics_with_config(config: &ObservabilityConfig) -> Result<Option<PrometheusHandle>> {
    if !config.enable_metrics_export {
        tracing::info!("Metrics export disabled");
        return Ok(None);
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Metrics collection initialized");
    Ok(Some(handle))
}

/// Create a span for database operations
pub fn db_span(operation: &str, table: &str) -> tracing::Span {
    tracing::info_span!(
        "db_operation",
        operation = operation,
        table = table,
        component = "database"
    )
}

/// Create a span for one Telegram update
pub fn telegram_span(operation: &str, chat_id: i64) -> tracing::Span {
    tracing::info_span!(
        "telegram_operation",
        operation = operation,
        chat_id = chat_id,
        component = "telegram"
    )
}

/// Record one processed update and how long it took
pub fn record_update(kind: &'static str, duration: Duration) {
    metrics::counter!("telegram_updates_total", "kind" => kind).increment(1);
    metrics::histogram!("update_duration_seconds").record(duration.as_secs_f64());
}

/// Record a booking attempt (`created`, `insufficient_seats`, `trip_unavailable`)
pub fn record_booking_outcome(outcome: &'static str) {
    metrics::counter!("bookings_total", "outcome" => outcome).increment(1);
}

pub fn record_booking_transition(status: &'static str) {
    metrics::counter!("booking_transitions_total", "status" => status).increment(1);
}

pub fn record_trip_created() {
    metrics::counter!("trips_created_total").increment(1);
}

pub fn record_transport_failure(method: &'static str) {
    metrics::counter!("transport_failures_total", "method" => method).increment(1);
}

pub fn record_conversation_expired(flow: &str) {
    let flow = flow.to_string();
    metrics::counter!("conversation_expired_total", "flow" => flow).increment(1);
}

/// Registers the webhook URL and the command list with Telegram
#[async_trait]
pub trait WebhookRegistrar: Send + Sync {
    /// Returns the URL that was registered
    async fn register(&self) -> AppResult<String>;
}

/// Dependencies of the admin server
#[derive(Clone, Default)]
pub struct AdminState {
    pub metrics: Option<PrometheusHandle>,
    pub db_pool: Option<Arc<PgPool>>,
    pub admin_secret: Option<String>,
    /// Absent when no webhook URL is configured
    pub registrar: Option<Arc<dyn WebhookRegistrar>>,
}

/// Start the admin server on a background task
pub async fn start_admin_server(state: AdminState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Admin server listening on {}", addr);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let state = state.clone();

                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = hyper::service::service_fn(
                            move |req: hyper::Request<hyper::body::Incoming>| {
                                let state = state.clone();
                                async move {
                                    let response = handle_admin_request(
                                        &state,
                                        req.method(),
                                        req.uri().path(),
                                        req.uri().query(),
                                    )
                                    .await;
                                    Ok::<_, std::convert::Infallible>(response)
                                }
                            },
                        );

                        if let Err(err) = http1::Builder::new().serve_connection(io, service).await
                        {
                            tracing::error!("Error serving connection: {:?}", err);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Error accepting connection: {}", e);
                }
            }
        }
    });

    Ok(())
}

fn text_response(status: StatusCode, body: impl Into<String>) -> Response<String> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    response
}

fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Route one admin request
pub async fn handle_admin_request(
    state: &AdminState,
    method: &Method,
    path: &str,
    query: Option<&str>,
) -> Response<String> {
    match (method, path) {
        (&Method::GET, "/health/live") => text_response(StatusCode::OK, "OK"),
        (&Method::GET, "/health/ready") => match &state.db_pool {
            Some(pool) => match check_database_health(pool).await {
                Ok(()) => text_response(StatusCode::OK, "OK"),
                Err(e) => text_response(StatusCode::SERVICE_UNAVAILABLE, format!("NOT READY: {}", e)),
            },
            None => text_response(StatusCode::OK, "OK"),
        },
        (&Method::GET, "/metrics") => match &state.metrics {
            Some(handle) => {
                let mut response = Response::new(handle.render());
                response.headers_mut().insert(
                    "content-type",
                    hyper::header::HeaderValue::from_static(
                        "text/plain; version=0.0.4; charset=utf-8",
                    ),
                );
                response
            }
            None => text_response(StatusCode::NOT_FOUND, "Metrics export disabled"),
        },
        (&Method::GET, "/webhook/setup") => setup_webhook(state, query).await,
        _ => text_response(StatusCode::NOT_FOUND, "Not Found"),
    }
}

async fn setup_webhook(state: &AdminState, query: Option<&str>) -> Response<String> {
    let authorized = match (&state.admin_secret, query_param(query, "secret")) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };
    if !authorized {
        tracing::warn!("Rejected webhook setup request with missing or wrong secret");
        return text_response(StatusCode::FORBIDDEN, "Forbidden");
    }

    let Some(registrar) = &state.registrar else {
        return text_response(StatusCode::BAD_REQUEST, "WEBHOOK_URL is not configured");
    };

    match registrar.register().await {
        Ok(url) => {
            tracing::info!(url = %url, "Webhook registered");
            text_response(StatusCode::OK, format!("Webhook set to {}", url))
        }
        Err(e) => {
            tracing::error!(error = %e, "Webhook registration failed");
            text_response(StatusCode::BAD_GATEWAY, format!("Webhook registration failed: {}", e))
        }
    }
}

/// Check database connectivity and basic query capability
pub async fn check_database_health(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Database health check failed: {}", e))?;

    tracing::debug!("Database health check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    struct FakeRegistrar {
        fail: bool,
    }

    #[async_trait]
    impl WebhookRegistrar for FakeRegistrar {
        async fn register(&self) -> AppResult<String> {
            if self.fail {
                Err(AppError::Network("telegram unreachable".to_string()))
            } else {
                Ok("https://bot.example.com/webhook".to_string())
            }
        }
    }

    fn state_with(registrar: Option<FakeRegistrar>) -> AdminState {
        AdminState {
            admin_secret: Some("a-long-enough-admin-secret".to_string()),
            registrar: registrar.map(|r| Arc::new(r) as Arc<dyn WebhookRegistrar>),
            ..AdminState::default()
        }
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("secret=abc&x=1"), "secret"), Some("abc"));
        assert_eq!(query_param(Some("x=1"), "secret"), None);
        assert_eq!(query_param(None, "secret"), None);
    }

    #[tokio::test]
    async fn test_health_routes() {
        let state = AdminState::default();
        let live = handle_admin_request(&state, &Method::GET, "/health/live", None).await;
        assert_eq!(live.status(), StatusCode::OK);
        let ready = handle_admin_request(&state, &Method::GET, "/health/ready", None).await;
        assert_eq!(ready.status(), StatusCode::OK);
        let missing = handle_admin_request(&state, &Method::GET, "/nope", None).await;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_webhook_setup_requires_secret() {
        let state = state_with(Some(FakeRegistrar { fail: false }));

        let none = handle_admin_request(&state, &Method::GET, "/webhook/setup", None).await;
        assert_eq!(none.status(), StatusCode::FORBIDDEN);

        let wrong =
            handle_admin_request(&state, &Method::GET, "/webhook/setup", Some("secret=guess")).await;
        assert_eq!(wrong.status(), StatusCode::FORBIDDEN);

        let ok = handle_admin_request(
            &state,
            &Method::GET,
            "/webhook/setup",
            Some("secret=a-long-enough-admin-secret"),
        )
        .await;
        assert_eq!(ok.status(), StatusCode::OK);
        assert!(ok.body().contains("https://bot.example.com/webhook"));
    }

    #[tokio::test]
    async fn test_webhook_setup_disabled_without_secret() {
        let state = AdminState {
            registrar: Some(Arc::new(FakeRegistrar { fail: false })),
            ..AdminState::default()
        };
        let response =
            handle_admin_request(&state, &Method::GET, "/webhook/setup", Some("secret=")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_webhook_setup_without_url_or_with_failure() {
        let query = Some("secret=a-long-enough-admin-secret");

        let unconfigured = state_with(None);
        let response = handle_admin_request(&unconfigured, &Method::GET, "/webhook/setup", query).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let failing = state_with(Some(FakeRegistrar { fail: true }));
        let response = handle_admin_request(&failing, &Method::GET, "/webhook/setup", query).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
