use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Extension, Json,
};
use tracing::{debug, info};

use crate::api::format::{map_rows, ParcelList};
use crate::app::AppState;
use crate::database::build_parcel_query;
use crate::error::ApiError;
use crate::filter::FilterSet;
use crate::types::Role;

/// GET /parcels - parcel records filtered by price, size and county.
/// The caller's role is resolved by middleware before this runs.
pub async fn parcels_get(
    State(state): State<AppState>,
    Extension(role): Extension<Role>,
    query: Result<Query<FilterSet>, QueryRejection>,
) -> Result<Json<ParcelList>, ApiError> {
    let Query(filters) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let sql = build_parcel_query(role, &filters);
    debug!(%role, query = %sql.query, params = sql.params.len(), "Built parcel query");

    let rows = state.store.fetch_parcels(&sql).await?;
    let list = map_rows(rows);

    info!(%role, count = list.count, "Served parcels");
    Ok(Json(list))
}
