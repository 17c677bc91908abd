use jsonwebtoken::{decode, decode_header, Algorithm, Validation};
use thiserror::Error;
use tracing::debug;

use super::jwks::{JwksCache, JwksError};
use super::Claims;
use crate::types::Role;

/// Reasons a credential was not accepted. Only ever logged; see [`Authorizer::resolve_role`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Malformed Authorization header: {0}")]
    MalformedHeader(&'static str),

    #[error("Token header has no kid")]
    MissingKeyId,

    #[error("Unsupported token algorithm {0:?}")]
    Algorithm(Algorithm),

    #[error(transparent)]
    Keys(#[from] JwksError),

    #[error("Invalid token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Resolves the caller's role from an optional bearer credential
pub struct Authorizer {
    keys: JwksCache,
    validation: Validation,
}

impl Authorizer {
    /// Tokens must be RS256, unexpired, and carry `audience` as `aud`.
    /// When `issuer` is given the `iss` claim must match it too.
    pub fn new(keys: JwksCache, audience: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self { keys, validation }
    }

    pub fn keys(&self) -> &JwksCache {
        &self.keys
    }

    /// Map an `Authorization` header value to a role.
    ///
    /// SECURITY: this fails open to the guest tier. A missing, malformed,
    /// expired or unverifiable credential is never rejected; the request
    /// simply proceeds with guest restrictions. Do not turn verification
    /// failures into 401s here.
    pub async fn resolve_role(&self, credential: Option<&str>) -> Role {
        let Some(credential) = credential else {
            return Role::Guest;
        };

        match self.verify(credential).await {
            Ok(claims) => {
                debug!(sub = %claims.sub, "Verified bearer token");
                Role::Registered
            }
            Err(e) => {
                debug!("Treating caller as guest: {}", e);
                Role::Guest
            }
        }
    }

    /// Verify a raw `Authorization` header value and return its claims
    pub async fn verify(&self, credential: &str) -> Result<Claims, AuthError> {
        let token = bearer_token(credential)?;

        let header = decode_header(token)?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::Algorithm(header.alg));
        }
        let kid = header.kid.ok_or(AuthError::MissingKeyId)?;

        let key = self.keys.decoding_key(&kid).await?;
        let token_data = decode::<Claims>(token, &key, &self.validation)?;
        Ok(token_data.claims)
    }
}

/// Extract the token from a `Bearer <token>` header value
pub fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let token = header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .ok_or(AuthError::MalformedHeader("expected Bearer scheme"))?
        .trim();

    if token.is_empty() {
        return Err(AuthError::MalformedHeader("empty token"));
    }
    Ok(token)
}
