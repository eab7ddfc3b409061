//! credgate - credential and access-control service

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod bootstrap;
mod config;

use config::{BootstrapAdmin, Config, LoggingConfig};
use credgate_api::{AppState, create_router};
use credgate_auth::{Authenticator, CredentialHasher, JwtManager};
use credgate_db::Database;

/// credgate - token issuing and access-control gateway
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, env = "CREDGATE_CONFIG", default_value = "config/default.toml")]
    config: String,

    /// Bind address
    #[arg(long, env = "CREDGATE_BIND")]
    bind: Option<String>,

    /// Port
    #[arg(short, long, env = "APP_PORT")]
    port: Option<u16>,

    /// Database connection string
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// Token signing secret
    #[arg(long, env = "JWT_KEY", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Token lifetime in hours
    #[arg(long, env = "TOKEN_TTL_HOURS")]
    token_ttl_hours: Option<i64>,

    /// Password for the bootstrap admin created on an empty database
    #[arg(long, env = "CREDGATE_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,
}

impl Args {
    /// Overlay command line and environment values onto the file config
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(url) = self.database_url {
            config.database.url = url;
        }
        if let Some(secret) = self.jwt_secret {
            config.auth.jwt_secret = Some(secret);
        }
        if let Some(hours) = self.token_ttl_hours {
            config.auth.token_ttl_hours = hours;
        }
        if let Some(password) = self.admin_password {
            match config.auth.bootstrap.as_mut() {
                Some(admin) => admin.password = password,
                None => {
                    config.auth.bootstrap = Some(BootstrapAdmin {
                        username: "admin".to_string(),
                        email: "admin@localhost".to_string(),
                        password,
                    })
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(&args.config)?;
    args.apply(&mut config);

    init_logging(&config.logging);

    info!("Starting credgate v{}", env!("CARGO_PKG_VERSION"));

    config.validate()?;

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    // Connection setup is the only retried operation
    let db = Database::connect_with_retry(
        &config.database.url,
        config.database.connect_attempts,
        config.database.connect_interval(),
    )
    .await
    .context("Failed to connect to the database")?;

    let hasher = CredentialHasher::new(config.auth.hash).context("Invalid [auth.hash] settings")?;

    bootstrap::ensure_seed_roles(&db).await?;
    bootstrap::ensure_bootstrap_admin(&db, &hasher, config.auth.bootstrap.as_ref()).await?;
    let permissions = bootstrap::load_permission_table(&db).await?.into_shared();

    let secret = config
        .jwt_secret()
        .context("JWT signing secret is not configured")?;
    let jwt = Arc::new(JwtManager::new(secret, config.token_ttl()?)?);

    let auth = Arc::new(
        Authenticator::new(Arc::new(db.clone()), jwt, hasher)?
            .with_audit_timeout(config.auth.audit_timeout()),
    );

    let state = AppState::new(db, auth, permissions);

    let app = create_router(state, Some(Arc::new(metrics_handle)))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.server.bind_address, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Initialize logging
fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
