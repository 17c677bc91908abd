use serde::{Deserialize, Serialize};

use crate::database::parcels::ParcelRow;

/// Public wire format of one parcel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelView {
    pub id: String,
    pub address: Option<String>,
    pub county: Option<String>,
    pub sqft: Option<f64>,
    pub price: Option<f64>,
    /// Stringified GeoJSON, not re-parsed
    pub geometry: Option<String>,
}

/// Response body of `GET /parcels`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParcelList {
    /// Rows returned after the limit, not a total match count
    pub count: usize,
    pub data: Vec<ParcelView>,
}

impl From<ParcelRow> for ParcelView {
    fn from(row: ParcelRow) -> Self {
        Self {
            id: row.sl_uuid.to_string(),
            address: row.address,
            county: row.county,
            sqft: row.sqft,
            price: row.total_value,
            geometry: row.geometry,
        }
    }
}

pub fn map_rows(rows: Vec<ParcelRow>) -> ParcelList {
    let data: Vec<ParcelView> = rows.into_iter().map(ParcelView::from).collect();
    ParcelList {
        count: data.len(),
        data,
    }
}
