//! checkout-daemon entry point.
//!
//! Thin by design: resolves config, builds the adapters and the store,
//! runs migrations, wires the shared state and middleware, and starts the
//! HTTP server. All route handlers live in `routes.rs`.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use checkout_config::AppConfig;
use checkout_daemon::{routes, state::AppState};
use checkout_orchestrator::Orchestrator;
use checkout_pms::HttpPmsClient;
use checkout_psp::HttpPspClient;
use checkout_store::PgStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::from_filename(".env.local");

    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config.log_level);

    let pool = checkout_store::connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;
    checkout_store::migrate(&pool).await.context("migration failed")?;

    let pms = HttpPmsClient::new(config.pms_base_url.clone(), config.pms_api_key.clone());
    let psp = HttpPspClient::new(config.psp_base_url.clone(), config.psp_secret_key.clone());
    let store = PgStore::new(pool);

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(pms),
        Arc::new(psp),
        Arc::new(store),
        config.hold_ttl,
        config.quote_ttl,
    ));

    // The hold expiration sweep is triggered by an external scheduler
    // calling POST /jobs/expire-holds (see JOB_AUTH_TOKEN), not by an
    // in-process timer, so a daemon restart never leaves the sweep
    // unscheduled and its cadence is an ops concern, not a code constant.
    let shared = AppState {
        orchestrator,
        idempotency_ttl: config.idempotency_ttl,
        webhook_dedup_ttl: config.webhook_dedup_ttl,
        psp_webhook_secret: Arc::new(config.psp_webhook_secret.clone()),
        job_auth_token: Arc::new(config.job_auth_token.clone()),
    };

    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&config.cors_allowed_origins));

    let addr: std::net::SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_addr))?;
    info!("checkout-daemon listening on http://{addr}");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.to_string().into()),
        )
        .init();
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
