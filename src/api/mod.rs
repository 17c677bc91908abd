pub mod format;

pub use format::{map_rows, ParcelList, ParcelView};
