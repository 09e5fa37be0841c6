use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An application user, as produced by an authenticator.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct User {
    pub realm: String,
    pub username: String,
    pub roles: Vec<String>,
    pub attributes: HashMap<String, String>,
}

impl User {
    /// Construct a new User with optional roles and attributes.
    pub fn new(
        realm: impl Into<String>,
        username: impl Into<String>,
        roles: Option<Vec<String>>,
        attributes: Option<HashMap<String, String>>,
    ) -> Self {
        User {
            realm: realm.into(),
            username: username.into(),
            roles: roles.unwrap_or_default(),
            attributes: attributes.unwrap_or_default(),
        }
    }

    /// The token subject: `<realm>-<username>`.
    pub fn subject(&self) -> String {
        format!("{}-{}", self.realm, self.username)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
