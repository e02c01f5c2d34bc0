//! Roles and access scopes.
//!
//! A role is either a department name or the privileged all-access role.
//! Scopes are computed per request; nothing here is persisted.

use std::collections::HashMap;

use crate::config::AccessConfig;

/// Normalize a role or department name: trimmed and lowercased.
pub fn normalize_role(role: &str) -> String {
    role.trim().to_lowercase()
}

/// What a request is allowed to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    /// Every department's documents and datasets.
    All,
    /// A single department, matched exactly against stored metadata.
    Department(String),
}

impl AccessScope {
    /// Resolve a raw role string. Comparison is case-insensitive.
    pub fn from_role(role: &str, privileged_role: &str) -> Self {
        let role = normalize_role(role);
        if role == normalize_role(privileged_role) {
            Self::All
        } else {
            Self::Department(role)
        }
    }

    pub fn is_privileged(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Department filter for store queries (`None` = unfiltered).
    pub fn department(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Department(d) => Some(d),
        }
    }

    pub fn allows(&self, department: &str) -> bool {
        match self {
            Self::All => true,
            Self::Department(d) => d == department,
        }
    }
}

impl std::fmt::Display for AccessScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => write!(f, "all departments"),
            Self::Department(d) => write!(f, "{d}"),
        }
    }
}

/// An authenticated principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub name: String,
    /// Normalized role.
    pub role: String,
}

/// Static credential directory built from `[access]`.
pub struct UserDirectory {
    users: HashMap<String, (String, String)>,
    privileged_role: String,
}

impl UserDirectory {
    pub fn new(config: &AccessConfig) -> Self {
        let users = config
            .users
            .iter()
            .map(|u| (u.name.clone(), (u.password.clone(), normalize_role(&u.role))))
            .collect();
        Self {
            users,
            privileged_role: normalize_role(&config.privileged_role),
        }
    }

    /// Look up a user by name and password. Usernames are case-sensitive.
    pub fn authenticate(&self, name: &str, password: &str) -> Option<User> {
        let (expected, role) = self.users.get(name)?;
        if expected == password {
            Some(User {
                name: name.to_string(),
                role: role.clone(),
            })
        } else {
            None
        }
    }

    pub fn scope_for(&self, user: &User) -> AccessScope {
        AccessScope::from_role(&user.role, &self.privileged_role)
    }

    pub fn privileged_role(&self) -> &str {
        &self.privileged_role
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
