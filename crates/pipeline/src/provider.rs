use gl_telemetry::{frame_time_ms, TelemetryTrack};
use gl_types::{Frame, TelemetrySample};

use crate::PipelineError;

/// Source of the telemetry sample for a frame.
pub trait TelemetryProvider {
    fn telemetry_for(&self, frame: &Frame) -> Option<TelemetrySample>;

    /// Seconds since the start of the video, whether or not telemetry
    /// covers the frame.
    fn timestamp_for(&self, frame: &Frame) -> Option<f64> {
        frame.timestamp
    }
}

/// Aligns frames to a telemetry track using the video's frame rate. Every
/// frame is looked up independently.
#[derive(Clone, Copy, Debug)]
pub struct ClockedTrack<'a> {
    track: &'a TelemetryTrack,
    fps: f64,
}

impl<'a> ClockedTrack<'a> {
    pub fn new(track: &'a TelemetryTrack, fps: f64) -> Result<Self, PipelineError> {
        if !(fps.is_finite() && fps > 0.) {
            return Err(PipelineError::FrameRate(fps));
        }

        Ok(ClockedTrack { track, fps })
    }
}

impl TelemetryProvider for ClockedTrack<'_> {
    fn telemetry_for(&self, frame: &Frame) -> Option<TelemetrySample> {
        self.track.sample_for_frame(frame.index, self.fps)
    }

    fn timestamp_for(&self, frame: &Frame) -> Option<f64> {
        Some(frame_time_ms(frame.index, self.fps) / 1000.)
    }
}

/// Uses the telemetry already attached to each frame, for input that was
/// aligned in an earlier run.
#[derive(Clone, Copy, Debug, Default)]
pub struct AttachedTelemetry;

impl TelemetryProvider for AttachedTelemetry {
    fn telemetry_for(&self, frame: &Frame) -> Option<TelemetrySample> {
        frame.telemetry
    }
}
