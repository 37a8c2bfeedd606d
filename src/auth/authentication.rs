use std::ops::Deref;

use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::{Flash, Redirect, status};
use rocket_dyn_templates::{Template, context};
use sqlx::SqlitePool;

use crate::db::{get_client, get_session_by_token};
use crate::error::AppError;

use super::{Client, Permission, SESSION_COOKIE};

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Client {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let cookies = request.cookies();

        let token = cookies
            .get_private(SESSION_COOKIE)
            .map(|c| c.value().to_string());

        let Some(token) = token else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let session = match get_session_by_token(db, &token).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = ?err, "Invalid session token");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        };

        if !session.is_valid() {
            tracing::warn!(client_id = session.client_id, "Session token expired");
            return Outcome::Error((Status::Unauthorized, ()));
        }

        match get_client(db, session.client_id).await {
            Ok(client) => {
                tracing::debug!(email = %client.email, role = %client.role, "Client authenticated via session token");
                Outcome::Success(client)
            }
            Err(AppError::NotFound(_)) => {
                tracing::warn!(client_id = session.client_id, "Session refers to a deleted client");
                Outcome::Error((Status::Unauthorized, ()))
            }
            Err(err) => {
                tracing::error!(client_id = session.client_id, error = ?err, "Failed to fetch client for valid session");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}

/// Guard for admin-only routes. Unauthenticated requests fail with 401 and
/// non-admins with 403; both catchers send the browser to the login page.
#[derive(Debug, Clone)]
pub struct Admin(pub Client);

impl Deref for Admin {
    type Target = Client;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match request.guard::<Client>().await {
            Outcome::Success(client) if client.has_permission(Permission::ViewAllClients) => {
                Outcome::Success(Admin(client))
            }
            Outcome::Success(client) => {
                tracing::warn!(email = %client.email, uri = %request.uri(), "Non-admin hit an admin route");
                Outcome::Error((Status::Forbidden, ()))
            }
            Outcome::Error(err) => Outcome::Error(err),
            Outcome::Forward(status) => Outcome::Forward(status),
        }
    }
}

#[catch(401)]
pub fn unauthorized(_req: &Request) -> Flash<Redirect> {
    tracing::warn!("Unauthorized access attempt");
    Flash::warning(Redirect::found("/login"), "Please log in to continue.")
}

#[catch(403)]
pub fn forbidden(_req: &Request) -> Redirect {
    tracing::warn!("Forbidden access attempt");
    Redirect::found("/login")
}

#[catch(404)]
pub fn not_found(req: &Request) -> status::NotFound<Template> {
    status::NotFound(Template::render(
        "error",
        context! {
            title: "Page not found",
            message: format!("Nothing lives at {}.", req.uri().path()),
        },
    ))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> status::Custom<Template> {
    status::Custom(
        Status::InternalServerError,
        Template::render(
            "error",
            context! {
                title: "Something went wrong",
                message: "The request could not be completed. Please try again later.",
            },
        ),
    )
}
