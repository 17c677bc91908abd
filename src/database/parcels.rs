use async_trait::async_trait;
use sqlx::FromRow;
use uuid::Uuid;

use super::manager::{DatabaseError, DatabaseManager};
use super::query_builder::{bind_params, QueryBuilder, SqlQuery};
use crate::filter::FilterSet;
use crate::types::Role;

/// Guests only ever see this county
pub const GUEST_COUNTY: &str = "dallas";

/// Row cap for guests, regardless of the requested limit
pub const GUEST_LIMIT: i64 = 200;

const GUEST_COUNTY_CONDITION: &str = "county = 'dallas'";

const BASE_QUERY: &str = "SELECT sl_uuid, address, county, \
     sqft::float8 AS sqft, total_value::float8 AS total_value, \
     public.ST_AsGeoJSON(geom) AS geometry \
     FROM takehome.dallas_parcels \
     WHERE 1=1";

/// One row of the parcel projection
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ParcelRow {
    pub sl_uuid: Uuid,
    pub address: Option<String>,
    pub county: Option<String>,
    pub sqft: Option<f64>,
    pub total_value: Option<f64>,
    /// GeoJSON text produced by PostGIS, passed through untouched
    pub geometry: Option<String>,
}

/// Compose the parcel query for `role`.
///
/// Guest restrictions go in first and cannot be undone by the caller: the
/// county clause is fixed text and the limit is replaced outright. A
/// caller-supplied county is still appended after it, so a guest asking for
/// another county gets an empty result rather than an error.
pub fn build_parcel_query(role: Role, filters: &FilterSet) -> SqlQuery {
    let mut builder = QueryBuilder::new(BASE_QUERY);
    let mut limit = filters.limit;

    if role.is_guest() {
        builder.and_where(GUEST_COUNTY_CONDITION);
        limit = GUEST_LIMIT;
    }

    if let Some(county) = filters.county_filter() {
        builder.and_where_bound("LOWER(county) =", county);
    }

    if let Some(min_price) = filters.min_price {
        builder.and_where_bound("total_value >=", min_price);
    }
    if let Some(max_price) = filters.max_price {
        builder.and_where_bound("total_value <=", max_price);
    }

    if let Some(min_sqft) = filters.min_sqft {
        builder.and_where_bound("sqft >=", min_sqft);
    }
    if let Some(max_sqft) = filters.max_sqft {
        builder.and_where_bound("sqft <=", max_sqft);
    }

    builder.order_by("sl_uuid").limit(limit);
    builder.build()
}

/// Executes parcel queries. The Postgres implementation is used in
/// production; tests substitute an in-memory one.
#[async_trait]
pub trait ParcelStore: Send + Sync {
    async fn fetch_parcels(&self, query: &SqlQuery) -> Result<Vec<ParcelRow>, DatabaseError>;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}

/// `ParcelStore` backed by the shared Postgres pool
#[derive(Clone)]
pub struct PgParcelStore {
    db: DatabaseManager,
}

impl PgParcelStore {
    pub fn new(db: DatabaseManager) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ParcelStore for PgParcelStore {
    async fn fetch_parcels(&self, query: &SqlQuery) -> Result<Vec<ParcelRow>, DatabaseError> {
        // Held for this one query; returned to the pool on drop, success or not
        let mut conn = self
            .db
            .pool()
            .acquire()
            .await
            .map_err(DatabaseError::from_acquire)?;

        let q = bind_params(sqlx::query_as::<_, ParcelRow>(&query.query), &query.params);
        let rows = q.fetch_all(&mut *conn).await?;
        Ok(rows)
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        self.db.health_check().await
    }
}
