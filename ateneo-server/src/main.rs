use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

// ri-utilizziamo le funzioni e strutture definite in lib.rs
use ateneo_server::{build_sqlite_url, connect_pool, routes, run_migrations, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env facoltativo, poi logging con filtro da RUST_LOG
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Costruisci l'URL del database SQLite
    let db_url = build_sqlite_url().context("build sqlite DATABASE_URL")?;
    tracing::info!("Using DATABASE_URL = {}", db_url);
    // Connetti al database
    let pool = connect_pool(&db_url).await.context("connect to sqlite")?;
    // Esegui le migrazioni del database
    run_migrations(&pool).await.context("run migrations")?;
    // Crea lo stato dell'applicazione condiviso
    let state = Arc::new(AppState::new(pool));
    // Configura le rotte dell'applicazione
    let app = routes::router(state);
    // Ottieni l'indirizzo di binding dal env o usa il default
    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3000".to_string());
    let addr: SocketAddr = bind.parse().context("parse BIND_ADDR")?;
    tracing::info!("Listening on http://{}", addr);
    // Crea il listener TCP e avvia il server Axum
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("bind tcp listener")?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("server shutdown")?;

    Ok(())
}
