mod employees;
mod limits;
mod partners;
mod problem;
mod roles;
mod router;
mod telemetry;

use std::net::SocketAddr;

use tracing::info;

use promo_admin_storage::{Database, Repositories};
use promo_admin_util::{load_env_file, AppConfig, StorageBackend};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let repositories = match config.storage {
        StorageBackend::Sqlite => {
            let database = Database::connect(&config.database_url).await?;
            database.run_migrations().await?;
            if config.seed_data {
                database.seed_defaults().await?;
            }
            Repositories::sqlite(&database)
        }
        StorageBackend::Memory => Repositories::in_memory(config.seed_data),
    };

    let state = router::AppState::new(metrics, repositories);

    let addr: SocketAddr = config.bind_addr;
    info!(
        stage = "app",
        %addr,
        env = %config.environment.as_str(),
        storage = config.storage.as_str(),
        "starting HTTP server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router::app_router(state))
        .await
        .map_err(|err| err.into())
}
