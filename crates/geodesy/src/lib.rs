//! Pixel offset to ground coordinate math. Angles are in degrees and
//! distances in meters throughout.

use geo::{GeodesicDestination, GeodesicDistance, Point};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum GeodesyError {
    #[error("height above ground must not be negative, got {0} m")]
    NegativeHeight(f64),
}

/// Angle between the optical axis and the ray through a pixel at offset
/// `(x, y)` from the principal point.
pub fn angle_from_pixel_offset(x: f64, y: f64, degrees_per_pixel: f64) -> f64 {
    (x * x + y * y).sqrt() * degrees_per_pixel
}

/// Compass bearing of a pixel offset for a camera whose top edge faces
/// `gimbal_yaw`.
///
/// The planar angle is measured against the image "up" axis, then subtracted
/// from the gimbal yaw. Results above 180 map to `180 - b` and results at or
/// below -180 map to `180 + b`. Neither branch is a true modular wrap, so
/// bearings near the seam come out mirrored (see the pinned tests).
pub fn bearing_from_pixel_offset(x: f64, y: f64, gimbal_yaw: f64) -> f64 {
    let planar = y.atan2(x).to_degrees();

    let to_up = if planar > -90. {
        planar - 90.
    } else {
        planar + 270.
    };

    let bearing = gimbal_yaw - to_up;

    if bearing > 180. {
        180. - bearing
    } else if bearing <= -180. {
        180. + bearing
    } else {
        bearing
    }
}

/// Distance on the ground plane from the point under the camera to the point
/// seen at `angle` off the optical axis.
pub fn ground_distance(angle: f64, height_above_ground: f64) -> Result<f64, GeodesyError> {
    if height_above_ground < 0. {
        return Err(GeodesyError::NegativeHeight(height_above_ground));
    }

    Ok(height_above_ground * angle.to_radians().tan())
}

/// Point reached by travelling `distance` meters from `origin` along
/// `bearing`, on the WGS84 ellipsoid.
pub fn destination_point(origin: Point<f64>, bearing: f64, distance: f64) -> Point<f64> {
    if distance == 0. {
        return origin;
    }

    origin.geodesic_destination(bearing, distance)
}

/// Geodesic distance between two points on the WGS84 ellipsoid.
pub fn distance_between(a: Point<f64>, b: Point<f64>) -> f64 {
    a.geodesic_distance(&b)
}
