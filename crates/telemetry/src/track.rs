use gl_types::{FlightState, TelemetrySample};

/// A telemetry block valid from `start_ms` (inclusive) to `end_ms`
/// (exclusive), in milliseconds since the start of the video.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeInterval {
    pub start_ms: i64,
    pub end_ms: i64,
    pub state: FlightState,
}

impl TimeInterval {
    pub fn contains(&self, time_ms: f64) -> bool {
        self.start_ms as f64 <= time_ms && time_ms < self.end_ms as f64
    }
}

/// Finds the interval covering `time_ms` in a slice sorted by start time.
///
/// Intervals are expected not to overlap; gaps between them are periods with
/// no telemetry and resolve to `None`.
pub fn resolve(intervals: &[TimeInterval], time_ms: f64) -> Option<&TimeInterval> {
    let idx = intervals.partition_point(|interval| interval.start_ms as f64 <= time_ms);

    if idx == 0 {
        return None;
    }

    let candidate = &intervals[idx - 1];
    candidate.contains(time_ms).then_some(candidate)
}

/// Elapsed time of a frame in milliseconds.
pub fn frame_time_ms(index: u64, fps: f64) -> f64 {
    1000. * index as f64 / fps
}

/// Telemetry intervals of one video, sorted by start time.
#[derive(Clone, Debug, Default)]
pub struct TelemetryTrack {
    intervals: Vec<TimeInterval>,
}

impl TelemetryTrack {
    /// Sorts the intervals by start time. When two intervals share a start
    /// time, the one given last wins.
    pub fn new(mut intervals: Vec<TimeInterval>) -> Self {
        intervals.sort_by_key(|interval| interval.start_ms);

        let mut deduped: Vec<TimeInterval> = Vec::with_capacity(intervals.len());

        for interval in intervals {
            match deduped.last_mut() {
                Some(last) if last.start_ms == interval.start_ms => *last = interval,
                _ => deduped.push(interval),
            }
        }

        TelemetryTrack { intervals: deduped }
    }

    pub fn intervals(&self) -> &[TimeInterval] {
        &self.intervals
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn resolve(&self, time_ms: f64) -> Option<&TimeInterval> {
        resolve(&self.intervals, time_ms)
    }

    /// Telemetry for frame `index` of a video played back at `fps`. The
    /// sample's timestamp is the frame's elapsed time in seconds.
    pub fn sample_for_frame(&self, index: u64, fps: f64) -> Option<TelemetrySample> {
        let time_ms = frame_time_ms(index, fps);

        self.resolve(time_ms)
            .map(|interval| TelemetrySample::new(interval.state, time_ms / 1000.))
    }
}
