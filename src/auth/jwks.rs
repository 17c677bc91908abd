use jsonwebtoken::{jwk::JwkSet, DecodingKey};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Debug, Error)]
pub enum JwksError {
    #[error("Key set fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("No signing key with kid {0}")]
    UnknownKey(String),

    #[error("Unusable signing key: {0}")]
    InvalidKey(#[from] jsonwebtoken::errors::Error),
}

struct RemoteSource {
    url: Url,
    client: reqwest::Client,
}

/// Signing keys of the identity provider, shared by every request.
///
/// Loaded at startup. When a token names a `kid` that is not cached the set is
/// fetched again, at most once per cooldown window, so provider key rotation
/// is picked up without a restart. Readers never wait on the network: the new
/// set is fetched first and swapped in under a short write lock.
pub struct JwksCache {
    source: Option<RemoteSource>,
    keys: RwLock<Arc<JwkSet>>,
    last_refresh: Mutex<Option<Instant>>,
    refresh_cooldown: Duration,
}

impl JwksCache {
    /// Empty cache fed from `url`; call [`JwksCache::refresh`] to load it
    pub fn remote(url: Url, fetch_timeout: Duration, refresh_cooldown: Duration) -> Result<Self, JwksError> {
        let client = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self {
            source: Some(RemoteSource { url, client }),
            keys: RwLock::new(Arc::new(JwkSet { keys: vec![] })),
            last_refresh: Mutex::new(None),
            refresh_cooldown,
        })
    }

    /// Fixed key set that is never refetched
    pub fn from_key_set(keys: JwkSet) -> Self {
        Self {
            source: None,
            keys: RwLock::new(Arc::new(keys)),
            last_refresh: Mutex::new(None),
            refresh_cooldown: Duration::MAX,
        }
    }

    /// Fetch the key set now, ignoring the cooldown. Returns the number of keys loaded.
    pub async fn refresh(&self) -> Result<usize, JwksError> {
        *self.last_refresh.lock().await = Some(Instant::now());
        self.fetch_and_swap().await
    }

    pub async fn len(&self) -> usize {
        self.keys.read().await.keys.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Decoding key for `kid`, refetching once if it is unknown
    pub async fn decoding_key(&self, kid: &str) -> Result<DecodingKey, JwksError> {
        if let Some(key) = self.lookup(kid).await {
            return key;
        }

        if self.refresh_allowed().await {
            debug!(kid, "Unknown signing key, refreshing key set");
            if let Err(e) = self.fetch_and_swap().await {
                warn!("Key set refresh failed: {}", e);
                return Err(e);
            }
            if let Some(key) = self.lookup(kid).await {
                return key;
            }
        }

        Err(JwksError::UnknownKey(kid.to_string()))
    }

    async fn lookup(&self, kid: &str) -> Option<Result<DecodingKey, JwksError>> {
        let keys = self.keys.read().await.clone();
        keys.find(kid)
            .map(|jwk| DecodingKey::from_jwk(jwk).map_err(JwksError::from))
    }

    /// Claims the refresh slot if the cooldown has passed
    async fn refresh_allowed(&self) -> bool {
        if self.source.is_none() {
            return false;
        }
        let mut last = self.last_refresh.lock().await;
        let due = match *last {
            Some(at) => at.elapsed() >= self.refresh_cooldown,
            None => true,
        };
        if due {
            *last = Some(Instant::now());
        }
        due
    }

    async fn fetch_and_swap(&self) -> Result<usize, JwksError> {
        let Some(source) = &self.source else {
            return Ok(self.len().await);
        };

        let fetched: JwkSet = source
            .client
            .get(source.url.clone())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let count = fetched.keys.len();
        *self.keys.write().await = Arc::new(fetched);
        info!(url = %source.url, keys = count, "Loaded signing key set");
        Ok(count)
    }
}
