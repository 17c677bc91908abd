use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::Authorizer;
use crate::database::ParcelStore;
use crate::handlers;
use crate::middleware::resolve_role_middleware;

/// Process-scoped resources, built once at startup and shared by every request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ParcelStore>,
    pub authorizer: Arc<Authorizer>,
}

impl AppState {
    pub fn new(store: Arc<dyn ParcelStore>, authorizer: Arc<Authorizer>) -> Self {
        Self { store, authorizer }
    }
}

pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Role-gated data
        .merge(parcel_routes(state.clone()))
        // Global middleware
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn parcel_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/parcels", get(handlers::parcels::parcels_get))
        .route_layer(middleware::from_fn_with_state(state, resolve_role_middleware))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true)
}
