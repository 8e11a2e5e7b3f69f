use geo::Point;

use crate::{Crs, GeoTransform, TerrainError};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Georeference {
    pub crs: Crs,
    pub transform: GeoTransform,
}

/// A single band elevation raster as read from disk, before it has been
/// placed in geographic coordinates.
#[derive(Clone, Debug)]
pub struct RawTile {
    pub name: String,
    pub georef: Option<Georeference>,
    pub cols: usize,
    pub rows: usize,

    /// Row major elevations in meters
    pub elevations: Vec<f64>,
    pub nodata: Option<f64>,
}

/// A raster placed in geographic coordinates, ready to be queried.
#[derive(Clone, Debug)]
pub struct TerrainTile {
    name: String,
    georef: Georeference,
    cols: usize,
    rows: usize,
    elevations: Vec<f64>,
    nodata: Option<f64>,

    /// (top-left, top-right, bottom-right, bottom-left) as lon/lat points
    corners: [Point<f64>; 4],
}

impl TerrainTile {
    pub fn from_raw(raw: RawTile) -> Result<Self, TerrainError> {
        let RawTile {
            name,
            georef,
            cols,
            rows,
            elevations,
            nodata,
        } = raw;

        let load_err = |reason: String| TerrainError::Load {
            path: name.clone(),
            reason,
        };

        let georef = georef.ok_or_else(|| load_err("missing georeferencing".into()))?;

        if cols == 0 || rows == 0 || elevations.len() != cols * rows {
            return Err(load_err(format!(
                "expected {} x {} elevations, found {}",
                cols,
                rows,
                elevations.len()
            )));
        }

        let mut corners = [Point::new(0., 0.); 4];
        for (corner, (x, y)) in corners
            .iter_mut()
            .zip(georef.transform.corners(cols, rows))
        {
            let (lon, lat) = georef.crs.to_geographic(x, y).ok_or_else(|| {
                load_err(format!("corner ({x}, {y}) cannot be reprojected to lat/lon"))
            })?;
            *corner = Point::new(lon, lat);
        }

        Ok(TerrainTile {
            name,
            georef,
            cols,
            rows,
            elevations,
            nodata,
            corners,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn georef(&self) -> &Georeference {
        &self.georef
    }

    pub fn corners(&self) -> &[Point<f64>; 4] {
        &self.corners
    }

    /// Containment test against the bottom edge for longitude and the right
    /// edge for latitude, closed on the west and south sides. For tiles in a
    /// projected system the reprojected corners are not exactly axis aligned,
    /// so which edges are used matters.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        let [_, top_right, bottom_right, bottom_left] = self.corners;

        bottom_left.x() <= lon
            && lon < bottom_right.x()
            && bottom_right.y() <= lat
            && lat < top_right.y()
    }

    /// Elevation of the single cell under `(lat, lon)`, without interpolation.
    pub fn sample(&self, lat: f64, lon: f64) -> Result<f64, TerrainError> {
        let (x, y) = self.georef.crs.from_geographic(lon, lat);
        let (row, col) = self.georef.transform.cell(x, y);

        if row < 0 || col < 0 || row as usize >= self.rows || col as usize >= self.cols {
            return Err(TerrainError::OutOfRaster {
                tile: self.name.clone(),
                row,
                col,
            });
        }

        let value = self.elevations[row as usize * self.cols + col as usize];

        let is_nodata = match self.nodata {
            Some(nodata) if nodata.is_nan() => value.is_nan(),
            Some(nodata) => value == nodata,
            None => false,
        };

        if is_nodata {
            return Err(TerrainError::NoData {
                tile: self.name.clone(),
                row,
                col,
            });
        }

        Ok(value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn geographic_tile(name: &str, west: f64, north: f64, base: f64) -> RawTile {
        // 4 x 4 cells of 0.25 degrees, elevation encodes the cell position
        let elevations = (0..16).map(|i| base + i as f64).collect();

        RawTile {
            name: name.to_owned(),
            georef: Some(Georeference {
                crs: Crs::Geographic,
                transform: GeoTransform::from_gdal([west, 0.25, 0., north, 0., -0.25]).unwrap(),
            }),
            cols: 4,
            rows: 4,
            elevations,
            nodata: Some(-9999.),
        }
    }

    #[test]
    fn computes_corners() {
        let tile = TerrainTile::from_raw(geographic_tile("a", 20.0, 11.0, 0.)).unwrap();

        assert_eq!(
            tile.corners(),
            &[
                Point::new(20.0, 11.0),
                Point::new(21.0, 11.0),
                Point::new(21.0, 10.0),
                Point::new(20.0, 10.0),
            ]
        );
    }

    #[test]
    fn containment_is_half_open() {
        let tile = TerrainTile::from_raw(geographic_tile("a", 20.0, 11.0, 0.)).unwrap();

        assert!(tile.contains(10.0, 20.0));
        assert!(tile.contains(10.5, 20.5));
        assert!(!tile.contains(11.0, 20.5));
        assert!(!tile.contains(10.5, 21.0));
        assert!(!tile.contains(9.99, 20.5));
    }

    #[test]
    fn samples_single_cell() {
        let tile = TerrainTile::from_raw(geographic_tile("a", 20.0, 11.0, 100.)).unwrap();

        // row 0, col 0
        assert_eq!(tile.sample(10.9, 20.1).unwrap(), 100.);
        // row 1, col 2
        assert_eq!(tile.sample(10.7, 20.6).unwrap(), 106.);
        // row 3, col 3
        assert_eq!(tile.sample(10.01, 20.99).unwrap(), 115.);
    }

    #[test]
    fn reports_nodata_and_out_of_raster() {
        let mut raw = geographic_tile("a", 20.0, 11.0, 0.);
        raw.elevations[5] = -9999.;
        let tile = TerrainTile::from_raw(raw).unwrap();

        assert!(matches!(
            tile.sample(10.7, 20.3),
            Err(TerrainError::NoData { row: 1, col: 1, .. })
        ));
        assert!(matches!(
            tile.sample(12.0, 20.3),
            Err(TerrainError::OutOfRaster { .. })
        ));
    }

    #[test]
    fn missing_georeference_fails_to_load() {
        let mut raw = geographic_tile("broken.tif", 20.0, 11.0, 0.);
        raw.georef = None;

        match TerrainTile::from_raw(raw) {
            Err(TerrainError::Load { path, .. }) => assert_eq!(path, "broken.tif"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn size_mismatch_fails_to_load() {
        let mut raw = geographic_tile("a", 20.0, 11.0, 0.);
        raw.elevations.pop();
        assert!(TerrainTile::from_raw(raw).is_err());
    }
}
