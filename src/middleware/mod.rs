pub mod auth;

pub use auth::resolve_role_middleware;
