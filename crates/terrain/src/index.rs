use std::path::Path;

use tracing::{debug, info};

use crate::{read_tile, RawTile, TerrainError, TerrainTile};

/// Set of terrain tiles covering a flight area. Built once and only read
/// afterwards, so it can be shared between threads.
#[derive(Clone, Debug, Default)]
pub struct TerrainIndex {
    tiles: Vec<TerrainTile>,
}

impl TerrainIndex {
    /// Places every tile in geographic coordinates. Fails on the first tile
    /// with missing or unusable georeferencing rather than building a partial
    /// index.
    pub fn build(tiles: impl IntoIterator<Item = RawTile>) -> Result<Self, TerrainError> {
        let tiles = tiles
            .into_iter()
            .map(TerrainTile::from_raw)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TerrainIndex { tiles })
    }

    /// Reads and indexes GeoTIFF tiles. The order of `paths` is the order in
    /// which overlapping tiles are preferred.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, TerrainError> {
        let total = paths.len();
        let mut raw = Vec::with_capacity(total);

        for (i, path) in paths.iter().enumerate() {
            info!("({} of {}) opening {}", i + 1, total, path.as_ref().display());
            raw.push(read_tile(path.as_ref())?);
        }

        let index = Self::build(raw)?;
        debug!("indexed {} terrain tiles", index.len());

        Ok(index)
    }

    pub fn tiles(&self) -> &[TerrainTile] {
        &self.tiles
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// First tile, in insertion order, whose extent contains the point.
    pub fn find_tile(&self, lat: f64, lon: f64) -> Option<&TerrainTile> {
        self.tiles.iter().find(|tile| tile.contains(lat, lon))
    }

    /// Terrain elevation in meters at `(lat, lon)`.
    pub fn query(&self, lat: f64, lon: f64) -> Result<f64, TerrainError> {
        let tile = self
            .find_tile(lat, lon)
            .ok_or(TerrainError::TileNotFound { lat, lon })?;

        tile.sample(lat, lon)
    }
}
