use anyhow::Context;
use clap::Parser;
use driving_school::connect_and_migrate;
use driving_school::db::{create_client, find_client_by_email};
use driving_school::env::{AppConfig, load_environment};
use driving_school::models::ClientInput;
use driving_school::telemetry::init_tracing;
use tracing::{info, warn};

/// Creates the first administrator account so someone can log in and manage
/// clients.
#[derive(Parser, Debug)]
#[command(name = "create_admin")]
#[command(version, about, long_about = None)]
struct Args {
    /// Display name of the administrator
    #[arg(long, default_value = "admin")]
    name: String,

    /// Login email
    #[arg(long, default_value = "a@a.com")]
    email: String,

    /// License category letter
    #[arg(long, default_value = "A")]
    license_category: String,

    /// Initial password
    #[arg(long, env = "ADMIN_PASSWORD", default_value = "admin")]
    password: String,

    /// Database to write to, overriding DATABASE_URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = load_environment();
    let _otel_guard = init_tracing();

    if let Err(err) = loaded {
        warn!("Failed to load environment files: {}", err);
    }

    let args = Args::parse();

    let mut config = AppConfig::load().context("Failed to read configuration")?;
    if let Some(database_url) = args.database_url {
        config.database_url = database_url;
    }

    let pool = connect_and_migrate(&config)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_url))?;

    let email = args.email.trim().to_lowercase();

    if find_client_by_email(&pool, &email).await?.is_some() {
        println!("Admin with email {} already exists, nothing to do.", email);
        return Ok(());
    }

    let input = ClientInput {
        name: args.name.trim(),
        email: &email,
        license_category: args.license_category.trim(),
        is_admin: true,
    };

    let id = create_client(&pool, &input, &args.password).await?;

    info!(client_id = id, email = %email, "Admin created");
    println!("Admin {} created with email {}.", input.name, email);

    Ok(())
}
