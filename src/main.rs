// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jesof

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use mikrotik_gateway::{
    ActivityLog, AppState, CircuitBreakers, Config, ConnectionPool, Connector, Gateway,
    MetricsRegistry, Result, RouterRegistry, create_router, start_pool_maintenance,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    setup_tracing();

    let config = Config::from_env();

    tracing::info!(
        "Loaded configuration for {} router(s)",
        config.routers.len()
    );
    for router in &config.routers {
        tracing::info!(
            "  - Router '{}' ({}) at {}:{}",
            router.id,
            router.display_name(),
            router.host,
            router.port
        );
    }

    let registry = RouterRegistry::new(config.routers.clone());
    let router_ids = registry.ids();

    let pool = Arc::new(ConnectionPool::new(
        Connector::new(config.connector.clone()),
        config.pool.clone(),
    ));
    let breakers = Arc::new(CircuitBreakers::new(config.breaker.clone()));
    let (activity, activity_task) = ActivityLog::spawn(config.activity_buffer);
    let metrics = MetricsRegistry::new();

    let gateway = Gateway::new(
        Arc::new(registry),
        pool.clone(),
        breakers,
        config.pppoe.clone(),
        activity,
        metrics,
    );

    // Root token; every request and background task hangs off it
    let shutdown = CancellationToken::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
        }
    });

    let maintenance = start_pool_maintenance(
        gateway.clone(),
        Duration::from_secs(config.cleanup_interval_secs),
        shutdown.clone(),
    );

    let addr: SocketAddr = config.server_addr.parse().map_err(|e| {
        tracing::error!("Invalid server address: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!("Failed to bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        gateway,
        router_ids,
        shutdown: shutdown.clone(),
    });
    let app = create_router(state);

    tracing::info!("MikroTik Gateway starting on {}", addr);
    tracing::info!("Endpoints:");
    tracing::info!("  - GET  /health                         - Health check");
    tracing::info!("  - GET  /metrics                        - Prometheus metrics");
    tracing::info!("  - POST /routers/{{id}}/test              - Connectivity probe");
    tracing::info!("  - PUT  /routers/{{id}}/nat               - Retarget NAT rule");
    tracing::info!("  - GET  /routers/{{id}}/pppoe/{{username}}  - PPPoE session status");
    tracing::info!("  - POST /pppoe/search                   - Fuzzy PPPoE search");

    axum::serve(listener, app)
        .with_graceful_shutdown({
            let shutdown = shutdown.clone();
            async move {
                shutdown.cancelled().await;
                tracing::info!("HTTP server shutting down");
            }
        })
        .await
        .map_err(|e| {
            tracing::error!("Server error: {}", e);
            e
        })?;

    // Server may also stop on its own; make sure background work follows
    shutdown.cancel();
    if let Err(e) = maintenance.await {
        tracing::warn!("Pool maintenance task ended abnormally: {}", e);
    }
    pool.shutdown().await;

    // The state (and with it the last activity handle) is gone, so the
    // consumer drains and exits
    if let Err(e) = activity_task.await {
        tracing::warn!("Activity log task ended abnormally: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

fn setup_tracing() {
    // RUST_LOG wins; plain "info" otherwise
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
