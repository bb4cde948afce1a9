use std::sync::Arc;

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use axum::Router;
use platewise::config::AppConfig;
use platewise::error::Result;
use platewise::nutrition::create_planner;
use platewise::onboarding::{OnboardingRouteState, PageMap, onboarding_routes};
use platewise::store::{KeyValueStore, LibSqlBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = AppConfig::from_env()?;

    eprintln!("🥗 Platewise v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Database: {}", config.db_path.display());
    eprintln!(
        "   Onboarding API: http://0.0.0.0:{}/api/onboarding/status",
        config.port
    );
    eprintln!("   Plan API: http://0.0.0.0:{}/api/nutrition/plan\n", config.port);

    let app = build_app(&config)
        .await
        .with_context(|| format!("failed to start with database {}", config.db_path.display()))?
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding API server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}

/// Open storage, pick a planner and restore the onboarding session.
async fn build_app(config: &AppConfig) -> Result<Router> {
    // ── Storage ──────────────────────────────────────────────────────────
    let storage: Arc<dyn KeyValueStore> =
        Arc::new(LibSqlBackend::new_local(&config.db_path).await?);

    // ── Planner ──────────────────────────────────────────────────────────
    let planner = create_planner(config)?;

    // ── Onboarding session ───────────────────────────────────────────────
    let pages = Arc::new(PageMap::default());
    let state = OnboardingRouteState::load(storage, planner, pages, config).await?;

    Ok(onboarding_routes(state))
}
