//! Planning poker backend binary entrypoint wiring the HTTP routes, the
//! revisioned document store, and the optional issue tracker boundary.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use dao::memory::MemoryRoomStore;
use dao::tracker::{TrackerClient, TrackerConfig};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(build_tracker());
    install_storage(app_state.clone()).await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Build the issue tracker client when the environment configures one.
/// Running without a tracker is supported; issue routes then degrade.
fn build_tracker() -> Option<Arc<TrackerClient>> {
    let config = match TrackerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            info!(%err, "issue tracker not configured; issue routes will degrade");
            return None;
        }
    };

    match TrackerClient::new(config) {
        Ok(client) => Some(Arc::new(client)),
        Err(err) => {
            warn!(error = %err, "failed to build tracker client; issue routes will degrade");
            None
        }
    }
}

/// Install the storage backend: CouchDB under supervision when configured,
/// otherwise a process-local in-memory store.
async fn install_storage(state: SharedState) {
    #[cfg(feature = "couch-store")]
    {
        use dao::couchdb::{CouchConfig, CouchRoomStore};
        use dao::room_store::RoomStore;
        use dao::storage::StorageError;

        match CouchConfig::from_env() {
            Ok(config) => {
                tokio::spawn(services::storage_supervisor::run(state, move || {
                    let config = config.clone();
                    async move {
                        let store = CouchRoomStore::connect(config)
                            .await
                            .map_err(StorageError::from)?;
                        Ok(Arc::new(store) as Arc<dyn RoomStore>)
                    }
                }));
                return;
            }
            Err(err) => info!(%err, "CouchDB not configured"),
        }
    }

    warn!("using the in-memory store; room data will not survive a restart");
    state.set_room_store(Arc::new(MemoryRoomStore::new())).await;
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
