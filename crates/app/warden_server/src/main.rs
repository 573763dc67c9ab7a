//! Warden API server binary.
//!
//! Connects PostgreSQL and Redis, runs migrations and serves the REST API.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use warden_api::config::ApiConfig;
use warden_core::AuthContext;
use warden_core::geo::{AmapLocator, GeoLocator, NoopLocator};
use warden_core::ledger::RedisLedger;
use warden_core::records::PgRecordStore;

/// CLI arguments for the API server.
#[derive(Parser, Debug)]
#[command(name = "warden_server", about = "Warden account and session API")]
struct Args {
    /// Port to listen on (0 = ephemeral).
    #[arg(long, env = "PORT", default_value_t = 3100)]
    port: u16,

    /// Address to bind.
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    host: String,

    /// PostgreSQL connection URL.
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "postgres://localhost:5432/warden"
    )]
    database_url: String,

    /// Redis connection URL for the token ledger.
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, default_value_t = 5)]
    max_connections: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,warden_api=debug,warden_core=debug".into()),
        )
        .init();

    let args = Args::parse();
    let config = ApiConfig::from_env()?;

    info!(port = args.port, app_env = ?config.app_env, "starting warden_server");
    info!(auth = ?config.auth, "auth settings");

    let pool = PgPoolOptions::new()
        .max_connections(args.max_connections)
        .acquire_timeout(std::time::Duration::from_secs(30))
        .connect(&args.database_url)
        .await?;

    let records = PgRecordStore::new(pool);
    info!("running database migrations");
    records.migrate().await?;

    info!("connecting token ledger");
    let ledger = RedisLedger::connect(&args.redis_url).await?;

    let geo: Arc<dyn GeoLocator> = match &config.amap_key {
        Some(key) => Arc::new(AmapLocator::new(key.clone())),
        None => {
            info!("AMAP_KEY not set, login locations will be empty");
            Arc::new(NoopLocator)
        }
    };

    let ctx = AuthContext::new(
        Arc::new(records),
        Arc::new(ledger),
        geo,
        config.auth.clone(),
    );
    let app = warden_api::router(warden_api::AppState::new(&ctx, config));

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutting down");
    })
    .await?;

    Ok(())
}
