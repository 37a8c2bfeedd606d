#[macro_use]
extern crate rocket;

pub mod admin;
pub mod auth;
pub mod db;
pub mod env;
pub mod error;
pub mod models;
pub mod routes;
pub mod telemetry;
pub mod validation;
#[cfg(test)]
mod test;

use admin::{
    add_client, add_client_form, add_lesson, add_lesson_form, add_test, add_test_form,
    admin_dashboard, client_detail, delete_client, delete_lesson, delete_test, edit_client,
    edit_client_form, review_test, review_test_form,
};
use auth::{forbidden, internal_error, login, logout, not_found, process_login, unauthorized};
use env::AppConfig;
use rocket::{Build, Rocket};
use rocket_dyn_templates::Template;
use routes::{
    client_dashboard, contact, health, index, process_contact, services, submit_own_test,
    take_test, take_test_form,
};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use telemetry::TelemetryFairing;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Figment(#[from] rocket::figment::Error),
    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("{0}")]
    Rocket(Box<rocket::Error>),
}

impl From<rocket::Error> for Error {
    fn from(value: rocket::Error) -> Self {
        Error::Rocket(Box::new(value))
    }
}

/// Opens the configured database and brings its schema up to date.
pub async fn connect_and_migrate(config: &AppConfig) -> Result<SqlitePool, sqlx::Error> {
    let pool = SqlitePoolOptions::new()
        .connect(&config.database_url)
        .await?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Migrations completed successfully");

    Ok(pool)
}

pub fn init_rocket(pool: SqlitePool, config: AppConfig) -> Rocket<Build> {
    info!("Starting driving school");

    rocket::build()
        .manage(pool)
        .manage(config)
        .mount(
            "/",
            routes![
                index,
                services,
                contact,
                process_contact,
                health,
                login,
                process_login,
                logout,
                client_dashboard,
                submit_own_test,
                take_test_form,
                take_test,
            ],
        )
        .mount(
            "/",
            routes![
                admin_dashboard,
                add_client_form,
                add_client,
                edit_client_form,
                edit_client,
                delete_client,
                client_detail,
                add_lesson_form,
                add_lesson,
                delete_lesson,
                add_test_form,
                add_test,
                review_test_form,
                review_test,
                delete_test,
            ],
        )
        .register(
            "/",
            catchers![unauthorized, forbidden, not_found, internal_error],
        )
        .attach(Template::fairing())
        .attach(TelemetryFairing)
}
