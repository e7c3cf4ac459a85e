use anyhow::anyhow;
use safety_file_staffing::env::{Settings, load_environment};
use safety_file_staffing::telemetry::init_tracing;
use safety_file_staffing::{db, init_rocket};
use tracing::{error, info};

#[rocket::main]
async fn main() -> Result<(), anyhow::Error> {
    load_environment().map_err(|e| anyhow!("Failed to load environment: {}", e))?;
    let settings = Settings::from_env();

    let _otel_guard = init_tracing(&settings)?;

    let pool = match db::connect(&settings.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to prepare database: {}", e);
            return Err(e.into());
        }
    };
    info!("Migrations completed successfully");

    init_rocket(pool)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed to launch: {}", e))?;

    Ok(())
}
