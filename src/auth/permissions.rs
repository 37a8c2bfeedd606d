use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permission {
    ViewOwnRecord,
    TakeOwnTest,

    ViewAllClients,
    ManageClients,
    ManageLessons,
    AuthorTests,
    ReviewTests,
}

/// Derived from the client's admin flag; there is no separate role column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Admin,
}

static CLIENT_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.insert(Permission::ViewOwnRecord);
    permissions.insert(Permission::TakeOwnTest);

    permissions
});

static ADMIN_PERMISSIONS: Lazy<HashSet<Permission>> = Lazy::new(|| {
    let mut permissions = HashSet::new();

    permissions.extend(CLIENT_PERMISSIONS.iter().copied());

    permissions.insert(Permission::ViewAllClients);
    permissions.insert(Permission::ManageClients);
    permissions.insert(Permission::ManageLessons);
    permissions.insert(Permission::AuthorTests);
    permissions.insert(Permission::ReviewTests);

    permissions
});

impl Role {
    pub fn from_admin_flag(is_admin: bool) -> Self {
        if is_admin { Role::Admin } else { Role::Client }
    }

    pub fn permissions(&self) -> &'static HashSet<Permission> {
        match self {
            Role::Client => &CLIENT_PERMISSIONS,
            Role::Admin => &ADMIN_PERMISSIONS,
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Client => "client",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
