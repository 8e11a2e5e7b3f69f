/// North-up affine transform between native coordinates and raster cells.
/// Equivalent to the GDAL geotransform `(x_origin, pixel_width, 0, y_origin,
/// 0, -pixel_height)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoTransform {
    /// Native x of the top left corner of the top left cell
    pub x_origin: f64,

    /// Cell size along x
    pub pixel_width: f64,

    /// Native y of the top left corner of the top left cell
    pub y_origin: f64,

    /// Cell size along y, positive when rows go southwards
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: [f64; 6]) -> Option<Self> {
        if gt[2] != 0. || gt[4] != 0. {
            // rotated rasters are not supported
            return None;
        }

        Some(GeoTransform {
            x_origin: gt[0],
            pixel_width: gt[1],
            y_origin: gt[3],
            pixel_height: -gt[5],
        })
    }

    /// Raster extent as (top-left, top-right, bottom-right, bottom-left), in
    /// native coordinates.
    pub fn corners(&self, cols: usize, rows: usize) -> [(f64, f64); 4] {
        let xmin = self.x_origin;
        let ymax = self.y_origin;
        let xmax = xmin + cols as f64 * self.pixel_width;
        let ymin = ymax - rows as f64 * self.pixel_height;

        [(xmin, ymax), (xmax, ymax), (xmax, ymin), (xmin, ymin)]
    }

    /// Cell containing native point `(x, y)` as `(row, col)`. Indices are
    /// truncated towards zero, not floored, so points just outside the top or
    /// left edge still land in the first row or column.
    pub fn cell(&self, x: f64, y: f64) -> (i64, i64) {
        let col = ((x - self.x_origin) / self.pixel_width) as i64;
        let row = ((self.y_origin - y) / self.pixel_height) as i64;
        (row, col)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform() -> GeoTransform {
        GeoTransform::from_gdal([20.0, 0.5, 0.0, 11.0, 0.0, -0.25]).unwrap()
    }

    #[test]
    fn rejects_rotation() {
        assert!(GeoTransform::from_gdal([0., 1., 0.1, 0., 0., -1.]).is_none());
    }

    #[test]
    fn computes_corners() {
        assert_eq!(
            transform().corners(4, 8),
            [(20.0, 11.0), (22.0, 11.0), (22.0, 9.0), (20.0, 9.0)]
        );
    }

    #[test]
    fn truncates_cell_indices() {
        let t = transform();
        assert_eq!(t.cell(20.0, 11.0), (0, 0));
        assert_eq!(t.cell(20.49, 10.76), (0, 0));
        assert_eq!(t.cell(20.5, 10.75), (1, 1));
        assert_eq!(t.cell(21.99, 9.01), (7, 3));
        // truncation, not floor
        assert_eq!(t.cell(19.9, 11.1), (0, 0));
    }
}
