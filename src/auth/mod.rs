pub mod authorizer;
pub mod jwks;

use serde::{Deserialize, Serialize};

pub use authorizer::{bearer_token, AuthError, Authorizer};
pub use jwks::{JwksCache, JwksError};

/// Claims read from a verified identity token. `aud`, `iss` and `exp` are
/// checked by the validator and not kept here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    #[serde(default)]
    pub token_use: Option<String>,
}
