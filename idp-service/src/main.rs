use idp_core::error::AppError;
use idp_core::observability::logging::init_tracing;
use idp_service::{
    build_router,
    config::IdpConfig,
    db,
    models::{Tenant, TenantMode},
    AppState,
};
use tokio::signal;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // Load configuration - fail fast if invalid
    let config = IdpConfig::from_env()?;

    init_tracing(&config.service_name, &config.log_level);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting identity provider"
    );

    let pool = db::create_pool(&config.database)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;
    db::run_migrations(&pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::Error::new(e)))?;

    let state = AppState::new(config.clone(), pool)?;

    ensure_configured_tenant(&state).await?;

    let app = build_router(state);

    let addr = config.common.socket_addr()?;
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

/// A single-mode deployment serves exactly one tenant; provision it at boot
/// when missing so a fresh database is immediately usable. Idempotent.
async fn ensure_configured_tenant(state: &AppState) -> Result<(), AppError> {
    if state.config.tenancy.mode != TenantMode::Single {
        return Ok(());
    }

    // validate() guarantees the name is present in single mode
    let name = state
        .config
        .tenancy
        .tenant_name
        .clone()
        .unwrap_or_default();

    let existing = state
        .db
        .find_tenant_by_name(&name)
        .await
        .map_err(AppError::from)?;
    if existing.is_none() {
        let tenant = Tenant::new(name.clone(), TenantMode::Single);
        state
            .db
            .insert_tenant(&tenant)
            .await
            .map_err(AppError::from)?;
        tracing::info!(tenant = %name, "Provisioned single-mode tenant");
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
