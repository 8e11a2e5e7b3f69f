mod crs;
mod geotiff;
mod index;
mod tile;
mod transform;

pub use crs::Crs;
pub use geotiff::read_tile;
pub use index::TerrainIndex;
pub use tile::{Georeference, RawTile, TerrainTile};
pub use transform::GeoTransform;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TerrainError {
    #[error("could not load terrain tile {path}: {reason}")]
    Load { path: String, reason: String },

    #[error("no terrain tile covers lat {lat}, lon {lon}")]
    TileNotFound { lat: f64, lon: f64 },

    #[error("row {row}, col {col} is outside the raster of terrain tile {tile}")]
    OutOfRaster { tile: String, row: i64, col: i64 },

    #[error("terrain tile {tile} has no elevation at row {row}, col {col}")]
    NoData { tile: String, row: i64, col: i64 },
}

impl TerrainError {
    /// Lookup failures only affect the frame being processed, unlike load
    /// failures which leave the index incomplete.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, TerrainError::Load { .. })
    }
}
