/// Per video counters, including every frame that was recorded with an
/// empty location because of a recoverable problem.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VideoStats {
    pub frames: usize,
    pub frames_with_detections: usize,
    pub boxes: usize,
    pub located_boxes: usize,

    /// Frames with detections but no covering telemetry interval
    pub missing_telemetry: usize,

    /// Frames whose terrain elevation could not be resolved
    pub missing_terrain: usize,

    /// Frames where the terrain is above the drone's altitude
    pub negative_height: usize,
}
