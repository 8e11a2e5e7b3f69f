use std::{collections::BTreeMap, path::Path, sync::LazyLock};

use gl_types::{Attitude, FlightState};
use regex::Regex;
use thiserror::Error;
use tracing::debug;
use uom::si::{angle::degree, f64::Length, length::meter};

use crate::{TelemetryTrack, TimeInterval};

static TIMECODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+):(\d{2}):(\d{2}),(\d{3})\s*-->\s*(\d+):(\d{2}):(\d{2}),(\d{3})$")
        .expect("valid regex")
});

/// Keys that make up a [`FlightState`], in the order they are written.
pub const FLIGHT_STATE_KEYS: [&str; 9] = [
    "Lat", "Lon", "Alt", "Yaw", "Pitch", "Roll", "GimYaw", "GimPitch", "GimRoll",
];

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("invalid timecode on line {line_no}: {line:?}")]
    Timecode { line_no: usize, line: String },

    #[error("invalid value {value:?} for {key} on line {line_no}")]
    Field {
        line_no: usize,
        key: String,
        value: String,
    },

    #[error("telemetry block starting at {start_ms} ms has no {key} field")]
    MissingField { start_ms: i64, key: &'static str },

    #[error("could not read telemetry file {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

pub fn read_from_path(path: impl AsRef<Path>) -> Result<TelemetryTrack, TelemetryError> {
    let path = path.as_ref();

    let contents = std::fs::read_to_string(path).map_err(|source| TelemetryError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let track = parse_str(&contents)?;
    debug!("read {} telemetry intervals from {}", track.len(), path.display());

    Ok(track)
}

/// Parses subtitle telemetry. Lines come in groups of four: a block number,
/// a `HH:MM:SS,mmm --> HH:MM:SS,mmm` timecode, a line of space separated
/// `key:value` fields and a separator.
pub fn parse_str(contents: &str) -> Result<TelemetryTrack, TelemetryError> {
    let mut intervals = Vec::new();
    let mut span = None;

    for (i, line) in contents.lines().enumerate() {
        let line_no = i + 1;

        match i % 4 {
            1 => span = Some(parse_timecode(line, line_no)?),
            2 => {
                let (start_ms, end_ms) = span.take().unwrap_or_default();
                let fields = parse_fields(line, line_no)?;
                intervals.push(into_interval(start_ms, end_ms, fields)?);
            }
            _ => {}
        }
    }

    Ok(TelemetryTrack::new(intervals))
}

fn parse_timecode(line: &str, line_no: usize) -> Result<(i64, i64), TelemetryError> {
    let err = || TelemetryError::Timecode {
        line_no,
        line: line.to_owned(),
    };

    let caps = TIMECODE_RE.captures(line.trim()).ok_or_else(err)?;

    let mut values = [0i64; 8];
    for (slot, value) in values.iter_mut().zip(caps.iter().skip(1)) {
        *slot = value
            .ok_or_else(err)?
            .as_str()
            .parse()
            .map_err(|_| err())?;
    }

    let to_ms = |v: &[i64]| v[0] * 3_600_000 + v[1] * 60_000 + v[2] * 1000 + v[3];

    Ok((to_ms(&values[..4]), to_ms(&values[4..])))
}

fn parse_fields(line: &str, line_no: usize) -> Result<BTreeMap<String, f64>, TelemetryError> {
    let mut fields = BTreeMap::new();

    for token in line.trim().split(' ') {
        let parts: Vec<&str> = token.split(':').collect();

        // anything that is not exactly `key:value` is decoration
        if let [key, value] = parts[..] {
            let parsed = value.trim().parse::<f64>().map_err(|_| TelemetryError::Field {
                line_no,
                key: key.to_owned(),
                value: value.to_owned(),
            })?;

            fields.insert(key.to_owned(), parsed);
        }
    }

    Ok(fields)
}

fn into_interval(
    start_ms: i64,
    end_ms: i64,
    mut fields: BTreeMap<String, f64>,
) -> Result<TimeInterval, TelemetryError> {
    let state = take_flight_state(&mut fields)
        .map_err(|key| TelemetryError::MissingField { start_ms, key })?;

    Ok(TimeInterval {
        start_ms,
        end_ms,
        state,
    })
}

/// Removes the [`FLIGHT_STATE_KEYS`] from `fields` and builds a
/// [`FlightState`] from them, reading angles as degrees and the altitude as
/// meters. Fails with the first key that is missing.
pub fn take_flight_state(
    fields: &mut BTreeMap<String, f64>,
) -> Result<FlightState, &'static str> {
    let mut values = [0.; 9];

    for (value, key) in values.iter_mut().zip(FLIGHT_STATE_KEYS) {
        *value = fields.remove(key).ok_or(key)?;
    }

    let [lat, lon, alt, yaw, pitch, roll, gim_yaw, gim_pitch, gim_roll] = values;

    Ok(FlightState {
        position: geo::Point::new(lon, lat),
        altitude: Length::new::<meter>(alt),
        attitude: Attitude::new::<degree>(yaw, pitch, roll),
        gimbal: Attitude::new::<degree>(gim_yaw, gim_pitch, gim_roll),
    })
}
