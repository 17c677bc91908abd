/// Shared types used across the codebase

use serde::{Deserialize, Serialize};

/// Access tier resolved for each request by the authorizer.
/// Never persisted; a request without a verifiable token is a guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Registered,
}

impl Role {
    pub fn is_guest(&self) -> bool {
        matches!(self, Role::Guest)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Registered => "registered",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
