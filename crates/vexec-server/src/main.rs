use anyhow::Result;
use chrono::Utc;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vexec_server::config::ServerConfig;
use vexec_server::state::AppState;
use vexec_server::{app, seed};
use vexec_storage::Store;

const DEFAULT_CONFIG_PATH: &str = "config/server.toml";

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  vexec-server [config.toml]                 Start the server");
    eprintln!("  vexec-server hash-password <password>      Print a bcrypt hash for [[auth.users]]");
}

#[tokio::main]
async fn main() -> Result<()> {
    vexec_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vexec=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("hash-password") => {
            let password = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("hash-password requires a <password> argument")
            })?;
            let hash =
                vexec_storage::auth::hash_password(password, vexec_storage::auth::DEFAULT_COST)?;
            println!("{hash}");
            Ok(())
        }
        Some("-h") | Some("--help") | Some("help") => {
            print_usage();
            Ok(())
        }
        Some(config_path) => run_server(config_path).await,
        None => run_server(DEFAULT_CONFIG_PATH).await,
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let db_url = config.database.connection_url();

    tracing::info!(
        http_port = config.http_port,
        data_dir = %config.database.data_dir,
        db = %db_url,
        "vexec-server starting"
    );

    let store = Arc::new(Store::new(&db_url, Path::new(&config.database.data_dir)).await?);

    match seed::seed_users(&store, &config.auth).await {
        Ok(count) => tracing::info!(count, "Configured users synced"),
        Err(e) => tracing::error!(error = %e, "Failed to seed configured users"),
    }

    let jwt_secret = match &config.auth.jwt_secret {
        Some(secret) if !secret.is_empty() => Arc::new(secret.clone()),
        _ => {
            let secret = vexec_storage::auth::generate_secret(48);
            tracing::warn!(
                "No jwt_secret configured. A random secret was generated and will change on restart. \
                 Set [auth].jwt_secret in config for production use."
            );
            Arc::new(secret)
        }
    };

    let advisor = app::build_advisor(&config.advisor);

    let state = AppState {
        store,
        advisor,
        start_time: Utc::now(),
        jwt_secret,
        token_expire_secs: config.auth.token_expire_secs,
        config: Arc::new(config.clone()),
    };

    let http_addr: SocketAddr = format!("{}:{}", config.bind_addr, config.http_port).parse()?;
    let app = app::build_http_app(state);
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(addr = %http_addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
