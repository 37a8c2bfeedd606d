use chrono::Utc;
use rocket::State;
use rocket::form::Form;
use rocket::http::{Cookie, CookieJar, SameSite};
use rocket::request::FlashMessage;
use rocket::response::Redirect;
use rocket_dyn_templates::{Template, context};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::db::{authenticate_client, create_client_session, invalidate_session};
use crate::env::AppConfig;
use crate::error::AppError;
use crate::routes::flash_view;
use crate::validation::{FlashOnInvalid, FormError};

use super::{Client, SESSION_COOKIE, UserSession};

#[derive(FromForm)]
pub struct LoginForm {
    #[field(default = String::new())]
    email: String,
    #[field(default = String::new())]
    password: String,
}

#[get("/login")]
pub fn login(flash: Option<FlashMessage<'_>>, current_user: Option<Client>) -> Template {
    Template::render(
        "login",
        context! {
            title: "Log in",
            flash: flash_view(flash),
            current_user: current_user,
        },
    )
}

#[post("/login", data = "<form>")]
pub async fn process_login(
    form: Form<LoginForm>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    config: &State<AppConfig>,
) -> Result<Redirect, FormError> {
    let email = form.email.trim().to_lowercase();
    info!(email = %email, "Login attempt");

    let client = authenticate_client(db, &email, &form.password)
        .await?
        .ok_or_else(|| AppError::Authentication("Invalid email or password.".to_string()))
        .flash_on_invalid("/login")?;

    let token = UserSession::generate_token();
    let expires_at = Utc::now() + config.session_duration();

    create_client_session(db, client.id, &token, expires_at.naive_utc()).await?;

    let max_age = rocket::time::Duration::hours(config.session_hours.max(1));
    cookies.add_private(
        Cookie::build((SESSION_COOKIE, token))
            .same_site(SameSite::Lax)
            .http_only(true)
            .max_age(max_age),
    );

    info!(client_id = client.id, role = %client.role, "Login successful");

    if client.is_admin {
        Ok(Redirect::found("/admin"))
    } else {
        Ok(Redirect::found("/client"))
    }
}

#[get("/logout")]
pub async fn logout(cookies: &CookieJar<'_>, db: &State<Pool<Sqlite>>) -> Redirect {
    let token = cookies
        .get_private(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string());

    if let Some(token) = token {
        if let Err(err) = invalidate_session(db, &token).await {
            err.log_and_record("Invalidating session on logout");
        }
    }

    cookies.remove_private(Cookie::build(SESSION_COOKIE));

    Redirect::found("/")
}
