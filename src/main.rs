use driving_school::db::clean_expired_sessions;
use driving_school::env::{AppConfig, load_environment};
use driving_school::telemetry::init_tracing;
use driving_school::{Error, connect_and_migrate, init_rocket};
use rocket::tokio;
use tracing::{error, info};

#[rocket::main]
async fn main() -> Result<(), Error> {
    // RUST_LOG and HONEYCOMB_API_KEY may come from the env files.
    let loaded = load_environment();
    let _otel_guard = init_tracing();

    if let Err(err) = loaded {
        error!("Failed to load environment files: {}", err);
    }

    let config = AppConfig::load()?;
    let pool = connect_and_migrate(&config).await?;

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    init_rocket(pool, config).launch().await?;

    Ok(())
}
