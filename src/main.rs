use std::net::SocketAddr;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crestsports_api::{config, db, middleware::rate_limit, routes, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (embedded defaults -> crestsports.toml -> env/.env)
    let app_cfg = config::load()?;

    // Logging (stdout + daily file rotation under logging.directory)
    let log_dir = &app_cfg.logging.directory;
    std::fs::create_dir_all(log_dir).ok();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let file_appender = tracing_appender::rolling::daily(log_dir, "crestsports-api.log");
    let (file_nb, file_guard) = tracing_appender::non_blocking(file_appender);
    let default_filter = format!("{},tower_http=info", app_cfg.logging.level);
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_nb))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_nb))
        .init();
    // Keep the guards alive so the non-blocking writers flush on exit
    let _log_guards = (stdout_guard, file_guard);

    info!(environment = app_cfg.app.environment.as_str(), "Configuration loaded");

    // Prepare data dir, open the pool, create the schema
    config::ensure_sqlite_parent_dir(&app_cfg.database.url)?;
    let pool = db::connect(&app_cfg.database).await?;
    db::init_db(&pool).await?;

    let host = app_cfg.server.host.clone();
    let port = app_cfg.server.port;
    let state = AppState::new(pool.clone(), app_cfg)?;

    // Periodic pruning so the limiter map does not grow without bound
    tokio::spawn(rate_limit::cleanup_task(state.rate_limiter.clone(), Duration::from_secs(300)));

    let app = routes::router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid listen addr {}:{} - {}", host, port, e))?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("CrestSports API listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    info!("Database pool closed");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("Shutdown signal received. Stopping server...");
}
