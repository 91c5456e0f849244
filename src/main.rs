use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{router, AppState};
use lab_core::config::page_limit_from_env_value;
use lab_core::constants::DEFAULT_DATABASE_PATH;
use lab_core::{CoreConfig, ReportEngine, SqliteStore};

/// Main entry point for the lab report service
///
/// Opens (or creates) the SQLite store, then serves the REST API with OpenAPI/Swagger UI.
///
/// # Environment Variables
/// - `LAB_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `LAB_DATABASE_PATH`: SQLite database file (default: "lab_data/reports.db")
/// - `LAB_DEFAULT_PAGE_LIMIT`: Listing page size when a request gives none (default: 20)
/// - `API_KEY`: When set, every `/reports` request must carry it in `x-api-key`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, store startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lab_run=info".parse()?)
                .add_directive("lab_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("LAB_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let database_path = std::env::var("LAB_DATABASE_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATABASE_PATH));
    let page_limit = page_limit_from_env_value(std::env::var("LAB_DEFAULT_PAGE_LIMIT").ok())?;
    let api_key = std::env::var("API_KEY").ok();

    let cfg = Arc::new(CoreConfig::new(database_path, page_limit)?);
    let store = Arc::new(SqliteStore::open(cfg.database_path())?);
    tracing::info!("++ Opened report store at {}", cfg.database_path().display());

    if api_key.is_none() {
        tracing::warn!("API_KEY not set; /reports routes are open");
    }

    let app = router(AppState::new(ReportEngine::new(store, cfg), api_key));

    tracing::info!("++ Starting lab REST API on {}", rest_addr);
    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
