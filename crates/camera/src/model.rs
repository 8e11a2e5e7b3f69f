use gl_types::BoundingBox;

use crate::CameraParameters;

/// Diagonal field of view pinhole approximation. Angles are treated as linear
/// in the pixel distance from the principal point, which only holds for
/// moderate fields of view. No lens distortion is modelled.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraModel {
    params: CameraParameters,
    degrees_per_pixel: f64,
    center_x: f64,
    center_y: f64,
}

impl CameraModel {
    pub fn new(params: CameraParameters) -> Self {
        let width = params.pixel_width as f64;
        let height = params.pixel_height as f64;
        let diagonal = (width * width + height * height).sqrt();

        CameraModel {
            params,
            degrees_per_pixel: params.dfov_degrees / diagonal,
            center_x: width / 2.,
            center_y: height / 2.,
        }
    }

    pub fn params(&self) -> &CameraParameters {
        &self.params
    }

    pub fn degrees_per_pixel(&self) -> f64 {
        self.degrees_per_pixel
    }

    pub fn center(&self) -> (f64, f64) {
        (self.center_x, self.center_y)
    }

    /// Offset of the box center from the principal point, in pixels. `y`
    /// grows upwards, so rows above the center give a positive offset.
    pub fn pixel_offset(&self, bbox: &BoundingBox) -> (f64, f64) {
        let px = bbox.center_x * self.params.pixel_width as f64;
        let py = bbox.center_y * self.params.pixel_height as f64;

        (px - self.center_x, self.center_y - py)
    }
}
