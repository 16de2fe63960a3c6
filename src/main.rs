// src/main.rs

// --- Modules ---
mod config;
mod db;
mod error;
mod models;
mod services;
mod state;
mod templates;
mod web;

// --- Imports ---
use crate::{config::Config, services::user_service, state::AppState};
use axum::serve;
use std::sync::Arc;
use time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions::{cookie::Key, ExpiredDeletion, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- Logging ---
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenquest=debug,tower_http=info,sqlx=warn,tower_sessions=info".into()),
        )
        .with(fmt::layer())
        .init();

    tracing::info!("🚀 Starting GreenQuest...");

    // --- Configuration (.env is loaded here) ---
    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{}", e))?;

    // --- Database ---
    let db_pool = match db::create_db_pool(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("❌ Could not initialise the database: {}", e);
            return Err(anyhow::anyhow!("Failed to connect/migrate database: {}", e));
        }
    };

    if let Some((email, password)) = &config.bootstrap_admin {
        user_service::ensure_bootstrap_admin(&db_pool, email, password)
            .await
            .map_err(|e| anyhow::anyhow!("Could not create the bootstrap admin: {}", e))?;
    }

    tokio::fs::create_dir_all(config.proofs_dir()).await?;
    tokio::fs::create_dir_all(config.avatars_dir()).await?;

    // --- Sessions ---
    let session_store = SqliteStore::new(db_pool.clone())
        .with_table_name("sessions")
        .map_err(|e| anyhow::anyhow!("Failed to create session store: {}", e))?;
    session_store.migrate().await?;

    let cleanup_store = session_store.clone();
    tokio::spawn(async move {
        if let Err(e) = cleanup_store
            .continuously_delete_expired(tokio::time::Duration::from_secs(60 * 60))
            .await
        {
            tracing::error!("Session cleanup task failed: {:?}", e);
        }
    });
    tracing::info!("🧹 Session cleanup task started.");

    let key = Key::try_from(config.session_secret.as_bytes())
        .map_err(|_| anyhow::anyhow!("SESSION_SECRET must be at least 64 bytes long"))?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.secure_cookies)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(Duration::days(1)))
        .with_signed(key);

    tracing::info!("🔑 Session layer configured.");

    // --- Application state ---
    let bind_addr = config.bind_addr;
    let app_state = AppState {
        db_pool,
        config: Arc::new(config),
    };

    // --- Listener ---
    let listener = match TcpListener::bind(bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("❌ Could not listen on {}: {}", bind_addr, e);
            return Err(e.into());
        }
    };
    tracing::info!("📡 Listening on http://{}", bind_addr);

    // --- Router and middleware ---
    let app = web::routes::create_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(session_layer),
    );

    if let Err(e) = serve(listener, app.into_make_service()).await {
        tracing::error!("❌ Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
