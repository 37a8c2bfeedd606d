use std::path::Path;

use rocket::figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://driving_school.db?mode=rwc";
const DEFAULT_SESSION_HOURS: i64 = 8;

/// Application settings layered on top of Rocket's own configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Lifetime of a login session.
    pub session_hours: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            session_hours: DEFAULT_SESSION_HOURS,
        }
    }
}

impl AppConfig {
    /// Defaults, then Rocket.toml / `ROCKET_*`, then the plain `DATABASE_URL`
    /// and `SESSION_HOURS` variables.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(rocket::Config::figment())
            .merge(Env::raw().only(&["DATABASE_URL", "SESSION_HOURS"]))
    }

    pub fn load() -> Result<Self, rocket::figment::Error> {
        Self::figment().extract()
    }

    pub fn session_duration(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_hours.max(1))
    }
}

pub fn load_environment() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !Path::new(path).exists() {
        warn!("Warning: Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)?;
    info!("Loaded environment from: {}", path);
    Ok(())
}
