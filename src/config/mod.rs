use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;
use url::Url;

/// Startup configuration failures. Any of these stops the process before it binds.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: String,
    pub max_connections: u32,
    /// Pool acquire timeout in seconds
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub region: String,
    pub user_pool_id: String,
    /// Expected `aud` claim
    pub client_id: String,
    /// Explicit key set location; derived from the issuer when unset
    pub jwks_url: Option<String>,
    pub jwks_refresh_cooldown_secs: u64,
    pub jwks_fetch_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl AuthConfig {
    /// Issuer URL of the Cognito user pool, also the `iss` claim of its tokens.
    pub fn issuer(&self) -> String {
        format!(
            "https://cognito-idp.{}.amazonaws.com/{}",
            self.region, self.user_pool_id
        )
    }

    pub fn jwks_url(&self) -> Result<Url, ConfigError> {
        let raw = match &self.jwks_url {
            Some(url) => url.clone(),
            None => format!("{}/.well-known/jwks.json", self.issuer()),
        };
        Url::parse(&raw).map_err(|e| ConfigError::Invalid {
            name: "JWKS_URL",
            reason: e.to_string(),
        })
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup. Environment
    /// defaults are applied first, then individual overrides.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = match lookup("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let database_url = required("DATABASE_URL")?;
        let region = required("COGNITO_REGION")?;
        let user_pool_id = required("COGNITO_USER_POOL_ID")?;
        let client_id = required("COGNITO_CLIENT_ID")?;

        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };
        config.database.url = database_url;
        config.auth.region = region;
        config.auth.user_pool_id = user_pool_id;
        config.auth.client_id = client_id;

        let config = config.with_overrides(&lookup)?;

        // Fail at startup rather than on the first key fetch
        config.auth.jwks_url()?;

        Ok(config)
    }

    fn with_overrides<F>(mut self, lookup: &F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Database overrides
        if let Some(v) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse("DATABASE_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = parse("DATABASE_CONNECTION_TIMEOUT", &v)?;
        }

        // Auth overrides
        if let Some(v) = lookup("JWKS_URL").filter(|v| !v.trim().is_empty()) {
            self.auth.jwks_url = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("JWKS_REFRESH_COOLDOWN_SECS") {
            self.auth.jwks_refresh_cooldown_secs = parse("JWKS_REFRESH_COOLDOWN_SECS", &v)?;
        }
        if let Some(v) = lookup("JWKS_FETCH_TIMEOUT_SECS") {
            self.auth.jwks_fetch_timeout_secs = parse("JWKS_FETCH_TIMEOUT_SECS", &v)?;
        }

        // API overrides
        if let Some(v) = lookup("PARCEL_API_PORT").or_else(|| lookup("PORT")) {
            self.api.port = parse("PARCEL_API_PORT", &v)?;
        }
        if let Some(v) = lookup("SECURITY_CORS_ORIGINS") {
            self.api.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        Ok(self)
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                connection_timeout: 30,
            },
            auth: AuthConfig {
                region: String::new(),
                user_pool_id: String::new(),
                client_id: String::new(),
                jwks_url: None,
                jwks_refresh_cooldown_secs: 300,
                jwks_fetch_timeout_secs: 10,
            },
            api: ApiConfig {
                port: 8000,
                cors_origins: vec![],
            },
        }
    }

    fn development() -> Self {
        let mut config = Self::base(Environment::Development);
        config.api.cors_origins = vec![
            "http://localhost:5173".to_string(),
            "http://127.0.0.1:5173".to_string(),
        ];
        config
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.database.max_connections = 50;
        config.database.connection_timeout = 5;
        config
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}
