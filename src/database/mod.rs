pub mod manager;
pub mod parcels;
pub mod query_builder;

pub use manager::{DatabaseError, DatabaseManager};
pub use parcels::{build_parcel_query, ParcelRow, ParcelStore, PgParcelStore};
pub use query_builder::{QueryBuilder, SqlParam, SqlQuery};
