use chrono::{NaiveDateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use serde::Serialize;

use crate::error::AppError;

use super::{Permission, Role};

pub const SESSION_COOKIE: &str = "session_token";

const SESSION_TOKEN_LENGTH: usize = 64;

#[cfg(not(test))]
const HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const HASH_COST: u32 = 4;

/// A driving-school client as seen by handlers. Also the authenticated user.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub license_category: String,
    pub is_admin: bool,
    pub role: Role,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbClient {
    pub id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub license_category: Option<String>,
    pub is_admin: Option<bool>,
}

impl From<DbClient> for Client {
    fn from(client: DbClient) -> Self {
        let is_admin = client.is_admin.unwrap_or_default();
        Self {
            id: client.id.unwrap_or_default(),
            name: client.name.unwrap_or_default(),
            email: client.email.unwrap_or_default(),
            license_category: client.license_category.unwrap_or_default(),
            is_admin,
            role: Role::from_admin_flag(is_admin),
        }
    }
}

impl Client {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                email = %self.email,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(AppError::Authorization(format!(
                "{} may not {:?}",
                self.email, permission
            )))
        }
    }

    /// A client may act on their own records; admins on anyone's.
    pub fn may_act_for(&self, client_id: i64) -> bool {
        self.id == client_id || self.has_permission(Permission::ViewAllClients)
    }
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    Ok(bcrypt::hash(password, HASH_COST)?)
}

#[derive(Debug, Clone)]
pub struct UserSession {
    pub id: i64,
    pub client_id: i64,
    pub token: String,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbUserSession {
    pub id: Option<i64>,
    pub client_id: Option<i64>,
    pub token: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl From<DbUserSession> for UserSession {
    fn from(session: DbUserSession) -> Self {
        Self {
            id: session.id.unwrap_or_default(),
            client_id: session.client_id.unwrap_or_default(),
            token: session.token.unwrap_or_default(),
            created_at: session
                .created_at
                .unwrap_or_else(|| Utc::now().naive_utc()),
            expires_at: session.expires_at.unwrap_or_default(),
        }
    }
}

impl UserSession {
    pub fn generate_token() -> String {
        rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_TOKEN_LENGTH)
            .map(char::from)
            .collect()
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now().naive_utc()
    }
}
