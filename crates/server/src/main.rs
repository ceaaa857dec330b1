use anyhow::Context;
use db::DBService;
use server::{AppState, router};
use services::services::{
    auth::bootstrap_admin, config::Config, database_validator::DatabaseValidator,
};
use tokio::{net::TcpListener, signal};
use tracing::{info, warn};
use utils::logging::{DEFAULT_FILTER, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();

    let config = Config::from_env().context("invalid configuration")?;
    init_tracing(DEFAULT_FILTER, config.log_json);
    if let Ok(path) = dotenv {
        info!(path = %path.display(), "loaded environment file");
    }
    if config.session_secret_generated {
        warn!("SESSION_SECRET not set; sessions will not survive a restart");
    }

    let db = DBService::new(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;
    DatabaseValidator::new(db.pool.clone())
        .ensure_ready()
        .await
        .context("database schema check failed")?;

    match bootstrap_admin(&db.pool, &config).await? {
        Some(admin) => info!(email = %admin.email, "created bootstrap admin"),
        None if config.bootstrap_admin.is_none() => {
            warn!("BOOTSTRAP_ADMIN_EMAIL/BOOTSTRAP_ADMIN_PASSWORD not set; no admin was created")
        }
        None => {}
    }

    let address = config.bind_address();
    let state = AppState::new(db, config);
    let app = router(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, "CRM server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install terminate handler");
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
}
