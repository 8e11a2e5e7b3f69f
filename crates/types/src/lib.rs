use serde::{
    ser::{SerializeMap, SerializeTuple},
    Serialize, Serializer,
};
use uom::si::{
    angle::degree,
    f64::{Angle, Length},
    length::meter,
};

#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub struct Attitude {
    pub yaw: Angle,
    pub pitch: Angle,
    pub roll: Angle,
}

impl Attitude {
    pub fn new<T: uom::si::angle::Unit + uom::Conversion<f64, T = f64>>(
        yaw: f64,
        pitch: f64,
        roll: f64,
    ) -> Self {
        Attitude {
            yaw: Angle::new::<T>(yaw),
            pitch: Angle::new::<T>(pitch),
            roll: Angle::new::<T>(roll),
        }
    }
}

/// Drone position and orientation as reported by one telemetry block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FlightState {
    pub position: geo::Point<f64>,

    /// Altitude above the reference datum
    pub altitude: Length,

    /// Attitude of the drone body
    pub attitude: Attitude,

    /// Attitude of the camera gimbal, independent of the body
    pub gimbal: Attitude,
}

impl FlightState {
    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }
}

/// Telemetry resolved for a single video frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TelemetrySample {
    pub state: FlightState,

    /// Terrain elevation under the drone, once it has been looked up in the
    /// terrain index
    pub terrain_elevation: Option<Length>,

    /// Seconds since the start of the video
    pub timestamp: f64,
}

impl TelemetrySample {
    pub fn new(state: FlightState, timestamp: f64) -> Self {
        TelemetrySample {
            state,
            terrain_elevation: None,
            timestamp,
        }
    }

    pub fn with_terrain_elevation(self, elevation: Length) -> Self {
        TelemetrySample {
            terrain_elevation: Some(elevation),
            ..self
        }
    }

    /// Altitude minus terrain elevation, if the elevation is known.
    pub fn height_above_ground(&self) -> Option<Length> {
        self.terrain_elevation
            .map(|elevation| self.state.altitude - elevation)
    }
}

// written as the flat record the consolidated files use, angles in degrees
// and lengths in meters
impl Serialize for TelemetrySample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let state = &self.state;
        let len = if self.terrain_elevation.is_some() { 11 } else { 10 };

        let mut map = serializer.serialize_map(Some(len))?;
        map.serialize_entry("Lat", &state.latitude())?;
        map.serialize_entry("Lon", &state.longitude())?;
        map.serialize_entry("Alt", &state.altitude.get::<meter>())?;
        if let Some(elevation) = self.terrain_elevation {
            map.serialize_entry("Height", &elevation.get::<meter>())?;
        }
        map.serialize_entry("Yaw", &state.attitude.yaw.get::<degree>())?;
        map.serialize_entry("Pitch", &state.attitude.pitch.get::<degree>())?;
        map.serialize_entry("Roll", &state.attitude.roll.get::<degree>())?;
        map.serialize_entry("GimYaw", &state.gimbal.yaw.get::<degree>())?;
        map.serialize_entry("GimPitch", &state.gimbal.pitch.get::<degree>())?;
        map.serialize_entry("GimRoll", &state.gimbal.roll.get::<degree>())?;
        map.serialize_entry("Timestamp", &self.timestamp)?;
        map.end()
    }
}

/// A detection in normalized image coordinates. All fractions are relative to
/// the image size, with the origin in the top left corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub class_id: i64,
    pub center_x: f64,
    pub center_y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(class_id: i64, center_x: f64, center_y: f64, width: f64, height: f64) -> Self {
        BoundingBox {
            class_id,
            center_x,
            center_y,
            width,
            height,
        }
    }
}

/// Written as `[class, cx, cy, w, h]`.
impl Serialize for BoundingBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(5)?;
        tuple.serialize_element(&self.class_id)?;
        tuple.serialize_element(&self.center_x)?;
        tuple.serialize_element(&self.center_y)?;
        tuple.serialize_element(&self.width)?;
        tuple.serialize_element(&self.height)?;
        tuple.end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub index: u64,
    pub boxes: Vec<BoundingBox>,
    pub telemetry: Option<TelemetrySample>,

    /// Seconds since the start of the video, when known without telemetry
    pub timestamp: Option<f64>,
}

impl Frame {
    pub fn new(index: u64, boxes: Vec<BoundingBox>) -> Self {
        Frame {
            index,
            boxes,
            telemetry: None,
            timestamp: None,
        }
    }

    pub fn with_telemetry(self, telemetry: Option<TelemetrySample>) -> Self {
        Frame { telemetry, ..self }
    }

    pub fn with_timestamp(self, timestamp: Option<f64>) -> Self {
        Frame { timestamp, ..self }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocatedBox {
    pub bbox: BoundingBox,
    pub location: Option<geo::Point<f64>>,
}

struct Location<'a>(&'a Option<geo::Point<f64>>);

impl Serialize for Location<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        gl_serde_util::serialize_opt_point(self.0, serializer)
    }
}

/// Written as `[[class, cx, cy, w, h], [lat, lon]]`, with `[]` in place of an
/// unknown location.
impl Serialize for LocatedBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.bbox)?;
        tuple.serialize_element(&Location(&self.location))?;
        tuple.end()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LocatedFrame {
    pub index: u64,
    pub boxes: Vec<LocatedBox>,
    pub telemetry: Option<TelemetrySample>,

    /// Seconds since the start of the video, when known
    pub timestamp: Option<f64>,
}

struct Placeholder(Option<f64>);

impl Serialize for Placeholder {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(usize::from(self.0.is_some())))?;
        if let Some(timestamp) = self.0 {
            map.serialize_entry("Timestamp", &timestamp)?;
        }
        map.end()
    }
}

/// Written as `[boxes, telemetry]`. A frame without telemetry keeps only its
/// timestamp, or an empty object when that is unknown too.
impl Serialize for LocatedFrame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.boxes)?;
        match &self.telemetry {
            Some(sample) => tuple.serialize_element(sample)?,
            None => tuple.serialize_element(&Placeholder(self.timestamp))?,
        }
        tuple.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state(altitude: f64) -> FlightState {
        FlightState {
            position: geo::Point::new(20.0, 10.0),
            altitude: Length::new::<meter>(altitude),
            attitude: Attitude::default(),
            gimbal: Attitude::new::<degree>(90.0, -90.0, 0.0),
        }
    }

    #[test]
    fn height_above_ground_needs_elevation() {
        let sample = TelemetrySample::new(state(120.0), 1.5);
        assert_eq!(sample.height_above_ground(), None);

        let sample = sample.with_terrain_elevation(Length::new::<meter>(20.0));
        assert_eq!(
            sample.height_above_ground(),
            Some(Length::new::<meter>(100.0))
        );
        assert_eq!(sample.timestamp, 1.5);
    }

    #[test]
    fn flight_state_exposes_lat_lon() {
        let state = state(0.0);
        assert_eq!(state.latitude(), 10.0);
        assert_eq!(state.longitude(), 20.0);
    }

    #[test]
    fn attitude_keeps_degrees() {
        let gimbal = state(0.0).gimbal;
        assert_eq!(gimbal.yaw.get::<degree>(), 90.0);
        assert_eq!(gimbal.pitch.get::<degree>(), -90.0);
    }

    #[test]
    fn located_frame_serializes_as_pair() {
        let bbox = BoundingBox::new(2, 0.5, 0.25, 0.1, 0.2);
        let frame = LocatedFrame {
            index: 4,
            boxes: vec![
                LocatedBox {
                    bbox,
                    location: Some(geo::Point::new(20.001, 10.002)),
                },
                LocatedBox {
                    bbox,
                    location: None,
                },
            ],
            telemetry: Some(
                TelemetrySample::new(state(120.0), 0.5)
                    .with_terrain_elevation(Length::new::<meter>(20.0)),
            ),
            timestamp: Some(0.5),
        };

        let value = serde_json::to_value(&frame).unwrap();

        assert_eq!(
            value[0],
            json!([
                [[2, 0.5, 0.25, 0.1, 0.2], [10.002, 20.001]],
                [[2, 0.5, 0.25, 0.1, 0.2], []]
            ])
        );
        assert_eq!(
            value[1],
            json!({
                "Lat": 10.0, "Lon": 20.0, "Alt": 120.0, "Height": 20.0,
                "Yaw": 0.0, "Pitch": 0.0, "Roll": 0.0,
                "GimYaw": 90.0, "GimPitch": -90.0, "GimRoll": 0.0,
                "Timestamp": 0.5
            })
        );
    }

    #[test]
    fn frame_without_telemetry_keeps_timestamp() {
        let mut frame = LocatedFrame {
            index: 4,
            boxes: Vec::new(),
            telemetry: None,
            timestamp: Some(0.25),
        };

        assert_eq!(
            serde_json::to_value(&frame).unwrap(),
            json!([[], {"Timestamp": 0.25}])
        );

        frame.timestamp = None;
        assert_eq!(serde_json::to_value(&frame).unwrap(), json!([[], {}]));
    }

    #[test]
    fn telemetry_omits_unknown_height() {
        let value = serde_json::to_value(TelemetrySample::new(state(120.0), 0.0)).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();

        assert_eq!(
            keys,
            vec![
                "Lat", "Lon", "Alt", "Yaw", "Pitch", "Roll", "GimYaw", "GimPitch", "GimRoll",
                "Timestamp"
            ]
        );
    }
}
