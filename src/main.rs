//! Courtside Back binary entrypoint wiring configuration, storage and the REST layer.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courtside_back::{
    build_router,
    config::{AppConfig, StorageBackend},
    dao::match_store::memory::InMemoryMatchStore,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let app_state = AppState::new(AppConfig::load());
    install_storage(&app_state).await?;

    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the in-memory store directly, or start supervising a database connection.
async fn install_storage(state: &SharedState) -> anyhow::Result<()> {
    match state.config().storage {
        StorageBackend::Memory => {
            info!("using in-memory match store; data is lost on restart");
            state
                .set_match_store(Arc::new(InMemoryMatchStore::new()))
                .await;
            Ok(())
        }
        StorageBackend::Mongo => spawn_mongo_supervisor(state.clone()),
        StorageBackend::Couch => spawn_couch_supervisor(state.clone()),
    }
}

#[cfg(feature = "mongo-store")]
fn spawn_mongo_supervisor(state: SharedState) -> anyhow::Result<()> {
    use courtside_back::{
        dao::match_store::{
            MatchStore,
            mongodb::{MongoConfig, MongoMatchStore},
        },
        dao::storage::StorageError,
        services::storage_supervisor,
    };

    tokio::spawn(storage_supervisor::run(state, || async {
        let config = MongoConfig::from_env().await?;
        let store = MongoMatchStore::connect(config).await?;
        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>)
    }));
    Ok(())
}

#[cfg(not(feature = "mongo-store"))]
fn spawn_mongo_supervisor(_state: SharedState) -> anyhow::Result<()> {
    anyhow::bail!("MongoDB storage requested but the `mongo-store` feature is disabled")
}

#[cfg(feature = "couch-store")]
fn spawn_couch_supervisor(state: SharedState) -> anyhow::Result<()> {
    use courtside_back::{
        dao::match_store::{
            MatchStore,
            couchdb::{CouchConfig, CouchMatchStore},
        },
        dao::storage::StorageError,
        services::storage_supervisor,
    };

    tokio::spawn(storage_supervisor::run(state, || async {
        let config = CouchConfig::from_env()?;
        let store = CouchMatchStore::connect(config).await?;
        Ok::<_, StorageError>(Arc::new(store) as Arc<dyn MatchStore>)
    }));
    Ok(())
}

#[cfg(not(feature = "couch-store"))]
fn spawn_couch_supervisor(_state: SharedState) -> anyhow::Result<()> {
    anyhow::bail!("CouchDB storage requested but the `couch-store` feature is disabled")
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
