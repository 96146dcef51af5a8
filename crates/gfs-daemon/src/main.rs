//! gfs-daemon entry point.
//!
//! Thin on purpose: loads config, sets up tracing, connects the Postgres
//! store, wires middleware, and starts the HTTP server. Route handlers live
//! in `routes.rs`; shared state types live in `state.rs`.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use gfs_config::{ConfigConsumer, ServiceConfig, UnusedKeyPolicy};
use gfs_daemon::{identity::USER_HEADER, routes, state};
use gfs_db::PgStore;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cfg = load_service_config()?;
    let secrets = gfs_config::resolve_secrets(&cfg)?;

    let pool = gfs_db::connect(&secrets.database_url, cfg.database.max_connections).await?;
    if cfg.database.run_migrations {
        gfs_db::migrate(&pool).await?;
    }

    let shared = Arc::new(state::AppState::new(PgStore::new(pool)));

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&cfg.cors_allowed_origins));

    info!("gfs-daemon listening on http://{}", cfg.bind_addr);

    axum::serve(tokio::net::TcpListener::bind(cfg.bind_addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Layers from GFS_CONFIG; defaults when unset.
fn load_service_config() -> anyhow::Result<ServiceConfig> {
    let paths = gfs_config::config_paths_from_env();
    if paths.is_empty() {
        info!("{} not set; using built-in defaults", gfs_config::ENV_CONFIG_PATHS);
        return Ok(ServiceConfig::default());
    }

    let path_refs: Vec<&str> = paths.iter().map(String::as_str).collect();
    let loaded = gfs_config::load_layered_yaml(&path_refs)?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let report = gfs_config::report_unused_keys(
        ConfigConsumer::Daemon,
        &loaded.config_json,
        UnusedKeyPolicy::Warn,
    )?;
    if !report.is_clean() {
        warn!(unused = ?report.unused_leaf_pointers, "config has keys the daemon does not read");
    }

    ServiceConfig::from_config_json(&loaded.config_json)
}

/// CORS: localhost dev origins plus any configured ones.
fn cors_layer(extra_origins: &[String]) -> CorsLayer {
    let localhost = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = localhost
        .iter()
        .copied()
        .chain(extra_origins.iter().map(String::as_str))
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderName::from_static(USER_HEADER),
        ])
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler; run until killed.
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
