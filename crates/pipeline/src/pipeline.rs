use std::path::Path;

use gl_camera::{CameraModel, CameraParameters};
use gl_geodesy::{
    angle_from_pixel_offset, bearing_from_pixel_offset, destination_point, ground_distance,
    GeodesyError,
};
use gl_terrain::TerrainIndex;
use gl_types::{BoundingBox, FlightState, Frame, LocatedBox, LocatedFrame, TelemetrySample};
use tracing::{debug, info, warn};
use uom::si::{angle::degree, f64::Length, length::meter};

use crate::{PipelineError, TelemetryProvider, VideoStats};

const PROGRESS_INTERVAL: usize = 100;

#[derive(Clone, Debug)]
pub struct VideoResult {
    pub frames: Vec<LocatedFrame>,
    pub stats: VideoStats,
}

/// Projects the detections of one video onto the ground. The camera model is
/// fixed per video; the terrain index is shared and only read.
pub struct GeoLocationPipeline<'a> {
    camera: CameraModel,
    terrain: &'a TerrainIndex,
}

impl<'a> GeoLocationPipeline<'a> {
    pub fn new(camera: CameraModel, terrain: &'a TerrainIndex) -> Self {
        GeoLocationPipeline { camera, terrain }
    }

    pub fn for_camera_file(
        path: impl AsRef<Path>,
        terrain: &'a TerrainIndex,
    ) -> Result<Self, PipelineError> {
        let camera = CameraParameters::read_from_path(path)?.derive();
        Ok(Self::new(camera, terrain))
    }

    pub fn camera(&self) -> &CameraModel {
        &self.camera
    }

    /// Locates every frame in the order given. Frames without detections are
    /// passed through untouched.
    pub fn run(
        &self,
        video: &str,
        frames: &[Frame],
        telemetry: &dyn TelemetryProvider,
    ) -> VideoResult {
        let mut stats = VideoStats::default();
        let total = frames.len();

        debug!(
            "{}: locating {} frames, {:.6} degrees per pixel",
            video,
            total,
            self.camera.degrees_per_pixel()
        );

        let located = frames
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                let located = self.locate_frame(video, frame, telemetry, &mut stats);

                if (i + 1) % PROGRESS_INTERVAL == 0 || i + 1 == total {
                    info!(
                        "{}: [{:.1}%] frame {} of {}",
                        video,
                        (i + 1) as f64 / total as f64 * 100.,
                        frame.index,
                        total
                    );
                }

                located
            })
            .collect();

        VideoResult {
            frames: located,
            stats,
        }
    }

    fn locate_frame(
        &self,
        video: &str,
        frame: &Frame,
        telemetry: &dyn TelemetryProvider,
        stats: &mut VideoStats,
    ) -> LocatedFrame {
        stats.frames += 1;

        let timestamp = telemetry.timestamp_for(frame);

        if frame.boxes.is_empty() {
            return unlocated(frame, frame.telemetry, timestamp);
        }

        stats.frames_with_detections += 1;
        stats.boxes += frame.boxes.len();

        let sample = match telemetry.telemetry_for(frame) {
            Some(sample) => self.with_terrain(video, frame.index, sample, stats),
            None => {
                warn!(
                    "{}: no telemetry covers frame {}, its detections will not be located",
                    video, frame.index
                );
                stats.missing_telemetry += 1;
                return unlocated(frame, None, timestamp);
            }
        };

        let height = match sample.height_above_ground() {
            Some(height) if height.get::<meter>() >= 0. => height,
            Some(height) => {
                warn!(
                    "{}: frame {} is {:.2} m below the terrain, its detections will not be located",
                    video,
                    frame.index,
                    -height.get::<meter>()
                );
                stats.negative_height += 1;
                return unlocated(frame, Some(sample), timestamp);
            }
            None => return unlocated(frame, Some(sample), timestamp),
        };

        let boxes: Vec<LocatedBox> = frame
            .boxes
            .iter()
            .map(|bbox| LocatedBox {
                bbox: *bbox,
                location: self.locate_box(&sample.state, height, bbox).ok(),
            })
            .collect();

        stats.located_boxes += boxes.iter().filter(|b| b.location.is_some()).count();

        LocatedFrame {
            index: frame.index,
            boxes,
            telemetry: Some(sample),
            timestamp: Some(sample.timestamp),
        }
    }

    /// Looks up the terrain under the drone once for the whole frame, unless
    /// the sample already carries an elevation.
    fn with_terrain(
        &self,
        video: &str,
        frame_index: u64,
        sample: TelemetrySample,
        stats: &mut VideoStats,
    ) -> TelemetrySample {
        if sample.terrain_elevation.is_some() {
            return sample;
        }

        let (lat, lon) = (sample.state.latitude(), sample.state.longitude());

        match self.terrain.query(lat, lon) {
            Ok(elevation) => sample.with_terrain_elevation(Length::new::<meter>(elevation)),
            Err(err) => {
                warn!(
                    "{}: no terrain height for frame {}: {}",
                    video, frame_index, err
                );
                stats.missing_terrain += 1;
                sample
            }
        }
    }

    /// Ground position of the center of `bbox`, seen from `origin` at
    /// `height` above the ground.
    pub fn locate_box(
        &self,
        origin: &FlightState,
        height: Length,
        bbox: &BoundingBox,
    ) -> Result<geo::Point<f64>, GeodesyError> {
        let (x, y) = self.camera.pixel_offset(bbox);

        let angle = angle_from_pixel_offset(x, y, self.camera.degrees_per_pixel());
        let bearing = bearing_from_pixel_offset(x, y, origin.gimbal.yaw.get::<degree>());
        let distance = ground_distance(angle, height.get::<meter>())?;

        Ok(destination_point(origin.position, bearing, distance))
    }
}

/// Keeps the boxes of `frame` without a location. The timestamp of the
/// telemetry, when there is one, takes precedence over `timestamp`.
fn unlocated(
    frame: &Frame,
    telemetry: Option<TelemetrySample>,
    timestamp: Option<f64>,
) -> LocatedFrame {
    LocatedFrame {
        index: frame.index,
        boxes: frame
            .boxes
            .iter()
            .map(|bbox| LocatedBox {
                bbox: *bbox,
                location: None,
            })
            .collect(),
        timestamp: telemetry.map(|sample| sample.timestamp).or(timestamp),
        telemetry,
    }
}
