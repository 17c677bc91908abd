#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::body::{to_bytes, Body, Bytes};
use axum::http::{header::AUTHORIZATION, Request, StatusCode};
use axum::Router;
use jsonwebtoken::{encode, jwk::JwkSet, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use parcel_api::auth::{Authorizer, JwksCache};
use parcel_api::database::{DatabaseError, ParcelRow, ParcelStore, SqlParam, SqlQuery};
use parcel_api::{app, AppState};

pub const AUDIENCE: &str = "test-client-id";
pub const ISSUER: &str = "https://cognito-idp.us-east-2.amazonaws.com/us-east-2_Test";
pub const KID: &str = "parcel-api-test-key";

pub const JWKS_JSON: &str = include_str!("../fixtures/jwks.json");
const PRIVATE_KEY_PEM: &[u8] = include_bytes!("../fixtures/test_rsa_private.pem");

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

pub fn key_set() -> JwkSet {
    serde_json::from_str(JWKS_JSON).expect("fixture jwks")
}

pub fn sign_token(aud: &str, exp_offset_secs: i64, kid: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({
        "sub": "registered-user",
        "aud": aud,
        "iss": ISSUER,
        "token_use": "id",
        "iat": now,
        "exp": now + exp_offset_secs,
    });
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(PRIVATE_KEY_PEM).expect("fixture key");
    encode(&header, &claims, &key).expect("sign token")
}

pub fn valid_token() -> String {
    sign_token(AUDIENCE, 3600, KID)
}

pub fn static_authorizer() -> Authorizer {
    Authorizer::new(JwksCache::from_key_set(key_set()), AUDIENCE, Some(ISSUER))
}

// ---------------------------------------------------------------------------
// In-memory stores
// ---------------------------------------------------------------------------

/// Returns seeded rows, honouring only the parts of the query the tests care
/// about: the fixed guest county, a bound county and the final LIMIT.
#[derive(Default)]
pub struct FakeStore {
    rows: Vec<ParcelRow>,
    seen: Mutex<Vec<SqlQuery>>,
}

impl FakeStore {
    pub fn new(rows: Vec<ParcelRow>) -> Self {
        Self { rows, seen: Mutex::new(vec![]) }
    }

    pub fn queries(&self) -> Vec<SqlQuery> {
        self.seen.lock().unwrap().clone()
    }

    pub fn last_query(&self) -> SqlQuery {
        self.queries().pop().expect("no query executed")
    }
}

#[async_trait]
impl ParcelStore for FakeStore {
    async fn fetch_parcels(&self, query: &SqlQuery) -> Result<Vec<ParcelRow>, DatabaseError> {
        self.seen.lock().unwrap().push(query.clone());

        let guest_only = query.query.contains("county = 'dallas'");
        let county = if query.query.contains("LOWER(county) = $1") {
            match &query.params[0] {
                SqlParam::Text(c) => Some(c.clone()),
                other => panic!("county bound as {:?}", other),
            }
        } else {
            None
        };
        let limit = match query.params.last() {
            Some(SqlParam::Integer(n)) => *n as usize,
            other => panic!("limit bound as {:?}", other),
        };

        Ok(self
            .rows
            .iter()
            .filter(|r| !guest_only || r.county.as_deref() == Some("dallas"))
            .filter(|r| match &county {
                Some(c) => r.county.as_deref().map(str::to_lowercase).as_deref() == Some(c.as_str()),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

/// Store whose pool never hands out a connection
pub struct UnavailableStore;

#[async_trait]
impl ParcelStore for UnavailableStore {
    async fn fetch_parcels(&self, _query: &SqlQuery) -> Result<Vec<ParcelRow>, DatabaseError> {
        Err(DatabaseError::Unavailable("pool timed out".into()))
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Err(DatabaseError::Unavailable("pool timed out".into()))
    }
}

pub fn parcel(n: u128, county: &str) -> ParcelRow {
    ParcelRow {
        sl_uuid: Uuid::from_u128(n),
        address: Some(format!("{} Elm St", n)),
        county: Some(county.to_string()),
        sqft: Some(1000.0 + n as f64),
        total_value: Some(100_000.0 + 1000.0 * n as f64),
        geometry: Some(r#"{"type":"Polygon","coordinates":[]}"#.to_string()),
    }
}

/// 250 Dallas parcels followed by 50 Tarrant parcels
pub fn seeded_rows() -> Vec<ParcelRow> {
    (0..300u128)
        .map(|n| parcel(n, if n < 250 { "dallas" } else { "tarrant" }))
        .collect()
}

pub fn router_with(store: Arc<dyn ParcelStore>) -> Router {
    let state = AppState::new(store, Arc::new(static_authorizer()));
    app(state, &["http://localhost:5173".to_string()])
}

pub struct TestResponse {
    pub status: StatusCode,
    pub bytes: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).expect("json body")
    }
}

pub async fn get(router: &Router, uri: &str, authorization: Option<&str>) -> TestResponse {
    let mut builder = Request::builder().uri(uri);
    if let Some(value) = authorization {
        builder = builder.header(AUTHORIZATION, value);
    }
    let request = builder.body(Body::empty()).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    TestResponse { status, bytes }
}

/// Positional placeholders in the order they appear in `query`
pub fn placeholder_positions(query: &str) -> Vec<usize> {
    let mut positions = vec![];
    let mut rest = query;
    while let Some(idx) = rest.find('$') {
        rest = &rest[idx + 1..];
        let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
        if !digits.is_empty() {
            positions.push(digits.parse().unwrap());
        }
    }
    positions
}

// ---------------------------------------------------------------------------
// Live server
// ---------------------------------------------------------------------------

/// Database the live tests run against. They are skipped when unset.
pub const LIVE_DATABASE_ENV: &str = "PARCEL_API_TEST_DATABASE_URL";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Mutex<Child>,
}

impl TestServer {
    fn spawn(database_url: &str) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_parcel-api"));
        cmd.env("PARCEL_API_PORT", port.to_string())
            .env("DATABASE_URL", database_url)
            .env("COGNITO_REGION", "us-east-2")
            .env("COGNITO_USER_POOL_ID", "us-east-2_Test")
            .env("COGNITO_CLIENT_ID", AUDIENCE)
            // Unreachable on purpose: the server must still start, serving everyone as guest
            .env("JWKS_URL", "http://127.0.0.1:1/.well-known/jwks.json")
            .env("JWKS_FETCH_TIMEOUT_SECS", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child: Mutex::new(child) })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline { break; }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK
                    || resp.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE
                {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        if let Ok(Some(status)) = self.child.lock().unwrap().try_wait() {
            anyhow::bail!("server exited early with {}", status);
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

/// Spawned server, or `None` when no live database is configured
pub async fn live_server() -> Result<Option<&'static TestServer>> {
    let Ok(database_url) = std::env::var(LIVE_DATABASE_ENV) else {
        eprintln!("skipping live test: {} not set", LIVE_DATABASE_ENV);
        return Ok(None);
    };
    let server = SERVER.get_or_init(|| TestServer::spawn(&database_url).expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(Some(server))
}
