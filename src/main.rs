// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{net::SocketAddr, sync::Arc};

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use custody_server::{
    accounts::AccountService,
    api::router,
    chain::{ChainClient, HttpChainClient, SealPolicy},
    config::{AppConfig, LogFormat},
    jobs::WorkerPool,
    keys::KeyManager,
    state::AppState,
    storage::Database,
    tokens::TokenService,
};

#[tokio::main]
async fn main() {
    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.server.log_format);
    info!(?config, "Configuration loaded");

    let db = Arc::new(
        Database::open(&config.server.database_path()).expect("Failed to open database"),
    );

    let chain: Arc<dyn ChainClient> = Arc::new(
        HttpChainClient::new(&config.chain.gateway_url).expect("Failed to build chain client"),
    );

    let keys = Arc::new(
        KeyManager::new(&config.keys, db.clone(), chain.clone())
            .expect("Failed to initialise key manager"),
    );

    // Jobs from a previous run lost their closures; fail them before workers start.
    let pool = Arc::new(WorkerPool::new(db.clone(), config.pool.queue_capacity));
    pool.recover_interrupted()
        .expect("Failed to recover interrupted jobs");
    pool.add_workers(config.pool.worker_count)
        .expect("Failed to start workers");

    let seal = SealPolicy {
        poll_interval: config.chain.seal_poll_interval,
        timeout: config.chain.seal_timeout,
    };
    let accounts = AccountService::new(db.clone(), keys.clone(), chain.clone(), pool.clone(), seal);
    let tokens = TokenService::new(keys, chain, pool.clone(), seal);

    let state = AppState::new(db, pool.clone(), accounts, tokens);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Failed to parse bind address");

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    match (&config.server.tls_cert_path, &config.server.tls_key_path) {
        (Some(cert), Some(key)) => {
            let tls_config = RustlsConfig::from_pem_file(cert, key)
                .await
                .expect("Failed to load TLS certificate and key");

            info!(%addr, "Custody server listening on https (docs at /docs)");
            let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());
            tokio::select! {
                result = server => {
                    if let Err(e) = result {
                        error!(error = %e, "HTTPS server failed");
                    }
                }
                _ = shutdown.cancelled() => {}
            }
        }
        (None, None) => {
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind listener");

            info!(%addr, "Custody server listening on http (docs at /docs)");
            let token = shutdown.clone();
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
            {
                error!(error = %e, "HTTP server failed");
            }
        }
        _ => {
            error!("TLS_CERT_PATH and TLS_KEY_PATH must be set together");
            std::process::exit(1);
        }
    }

    info!("Stopping worker pool");
    pool.stop().await;
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
    shutdown.cancel();
}
