use std::{fs::File, io::BufWriter, path::Path};

use anyhow::Context;
use colored::Colorize;
use gl_types::LocatedFrame;
use prettytable::{format, Table};
use serde::{ser::SerializeMap, Serialize, Serializer};
use uom::si::{angle::degree, length::meter};

use crate::runner::RunReport;

pub const CSV_HEADER: [&str; 19] = [
    "Frame",
    "Lat",
    "Lon",
    "Alt",
    "Elevation",
    "Yaw",
    "Pitch",
    "Roll",
    "GimYaw",
    "GimPitch",
    "GimRoll",
    "Timestamp",
    "BoundingBoxClass",
    "BoundingBoxCentre_X",
    "BoundingBoxCentre_Y",
    "BoundingBox_Width%",
    "BoundingBox_Height%",
    "BoundingBox_Lat",
    "BoundingBox_Lon",
];

/// Frames keyed by their index, in the order given.
pub struct FrameMap<'a>(pub &'a [LocatedFrame]);

impl Serialize for FrameMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for frame in self.0 {
            map.serialize_entry(&frame.index.to_string(), frame)?;
        }
        map.end()
    }
}

pub fn write_json(path: impl AsRef<Path>, frames: &[LocatedFrame]) -> anyhow::Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;

    serde_json::to_writer_pretty(BufWriter::new(file), &FrameMap(frames))
        .with_context(|| format!("failed to write {}", path.display()))
}

/// One record per (frame, box), with empty fields wherever telemetry,
/// terrain elevation or the box location is unknown. Angles are written in
/// degrees and lengths in meters.
pub fn csv_records(frames: &[LocatedFrame]) -> Vec<Vec<String>> {
    let opt = |value: Option<f64>| value.map(|v| v.to_string()).unwrap_or_default();

    let mut records = Vec::new();

    for frame in frames {
        let drone: Vec<String> = match &frame.telemetry {
            Some(sample) => {
                let state = &sample.state;
                vec![
                    state.latitude().to_string(),
                    state.longitude().to_string(),
                    state.altitude.get::<meter>().to_string(),
                    opt(sample.terrain_elevation.map(|e| e.get::<meter>())),
                    state.attitude.yaw.get::<degree>().to_string(),
                    state.attitude.pitch.get::<degree>().to_string(),
                    state.attitude.roll.get::<degree>().to_string(),
                    state.gimbal.yaw.get::<degree>().to_string(),
                    state.gimbal.pitch.get::<degree>().to_string(),
                    state.gimbal.roll.get::<degree>().to_string(),
                    sample.timestamp.to_string(),
                ]
            }
            None => vec![String::new(); 11],
        };

        for located in &frame.boxes {
            let b = &located.bbox;

            let mut record = Vec::with_capacity(CSV_HEADER.len());
            record.push(frame.index.to_string());
            record.extend(drone.iter().cloned());
            record.extend([
                b.class_id.to_string(),
                b.center_x.to_string(),
                b.center_y.to_string(),
                b.width.to_string(),
                b.height.to_string(),
                opt(located.location.map(|p| p.y())),
                opt(located.location.map(|p| p.x())),
            ]);

            records.push(record);
        }
    }

    records
}

pub fn write_csv(path: impl AsRef<Path>, frames: &[LocatedFrame]) -> anyhow::Result<()> {
    let path = path.as_ref();

    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Always)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    writer.write_record(CSV_HEADER)?;
    for record in csv_records(frames) {
        writer.write_record(&record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Writes `<video>.json` and `<video>.csv` into `dir`.
pub fn write_results(
    dir: impl AsRef<Path>,
    video: &str,
    frames: &[LocatedFrame],
) -> anyhow::Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory {}", dir.display()))?;

    let json_path = dir.join(format!("{}.json", video));
    write_json(&json_path, frames)?;
    info!("{}: (1/2) json >> {}", video, json_path.display());

    let csv_path = dir.join(format!("{}.csv", video));
    write_csv(&csv_path, frames)?;
    info!("{}: (2/2) csv >> {}", video, csv_path.display());

    Ok(())
}

/// Per video counters for the whole run. Videos that failed or were skipped
/// are listed without counters.
pub fn summary_table(report: &RunReport) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row![
        "Video",
        "Status",
        "Frames",
        "With detections",
        "Boxes",
        "Located",
        "No telemetry",
        "No terrain",
        "Below terrain"
    ]);

    for (video, stats) in &report.videos {
        match stats {
            Some(s) => {
                let status = if s.located_boxes == s.boxes {
                    "ok".green()
                } else {
                    "partial".yellow()
                };

                table.add_row(row![
                    video,
                    status,
                    r->s.frames,
                    r->s.frames_with_detections,
                    r->s.boxes,
                    r->s.located_boxes,
                    r->s.missing_telemetry,
                    r->s.missing_terrain,
                    r->s.negative_height
                ]);
            }
            None => {
                table.add_row(row![video, "failed".red()]);
            }
        }
    }

    for video in &report.skipped {
        table.add_row(row![video, "skipped".yellow()]);
    }

    table
}

#[cfg(test)]
mod tests {
    use gl_pipeline::VideoStats;
    use gl_types::{Attitude, BoundingBox, FlightState, LocatedBox, TelemetrySample};
    use serde_json::{json, Value};
    use uom::si::f64::Length;

    use super::*;

    fn sample(elevation: Option<f64>) -> TelemetrySample {
        let sample = TelemetrySample::new(
            FlightState {
                position: geo::Point::new(20., 10.),
                altitude: Length::new::<meter>(120.),
                attitude: Attitude::new::<degree>(1., 2., 3.),
                gimbal: Attitude::new::<degree>(90., -90., 0.),
            },
            0.5,
        );

        match elevation {
            Some(e) => sample.with_terrain_elevation(Length::new::<meter>(e)),
            None => sample,
        }
    }

    fn frames() -> Vec<LocatedFrame> {
        let bbox = BoundingBox::new(2, 0.5, 0.25, 0.1, 0.2);

        vec![
            LocatedFrame {
                index: 15,
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
                telemetry: Some(sample(Some(20.))),
                timestamp: Some(0.5),
            },
            LocatedFrame {
                index: 3,
                boxes: vec![LocatedBox {
                    bbox,
                    location: None,
                }],
                telemetry: None,
                timestamp: Some(0.1),
            },
            LocatedFrame {
                index: 40,
                boxes: Vec::new(),
                telemetry: Some(sample(None)),
                timestamp: Some(0.5),
            },
        ]
    }

    #[test]
    fn json_keeps_frame_order_and_shape() {
        let value = serde_json::to_value(FrameMap(&frames())).unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();

        assert_eq!(keys, vec!["15", "3", "40"]);

        assert_eq!(
            value["15"][0][0],
            json!([[2, 0.5, 0.25, 0.1, 0.2], [10.002, 20.001]])
        );
        assert_eq!(value["15"][0][1][1], json!([]));
        assert_eq!(value["15"][1]["Height"], json!(20.));
        assert_eq!(value["15"][1]["GimYaw"], json!(90.));
        assert_eq!(value["3"][1], json!({"Timestamp": 0.1}));
        assert_eq!(value["40"][0], json!([]));
        assert!(value["40"][1].get("Height").is_none());
        assert_eq!(value["40"][1]["Timestamp"], json!(0.5));
    }

    #[test]
    fn csv_has_one_row_per_box() {
        let records = csv_records(&frames());

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.len() == CSV_HEADER.len()));

        assert_eq!(records[0][0], "15");
        assert_eq!(records[0][1], "10");
        assert_eq!(records[0][4], "20");
        assert_eq!(records[0][12], "2");
        assert_eq!(records[0][17], "10.002");
        assert_eq!(records[0][18], "20.001");

        assert_eq!(records[1][17], "");
        assert_eq!(records[2][0], "3");
        assert!(records[2][1..12].iter().all(|field| field.is_empty()));
    }

    #[test]
    fn writes_quoted_csv() {
        let dir = tempfile::tempdir().unwrap();
        write_results(dir.path(), "clip", &frames()).unwrap();

        let csv = std::fs::read_to_string(dir.path().join("clip.csv")).unwrap();
        let mut lines = csv.lines();

        assert!(lines.next().unwrap().starts_with("\"Frame\",\"Lat\",\"Lon\""));
        assert!(lines.next().unwrap().starts_with("\"15\",\"10\",\"20\",\"120\",\"20\""));
        assert_eq!(csv.lines().count(), 4);

        let json: Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("clip.json")).unwrap())
                .unwrap();
        assert_eq!(json.as_object().unwrap().len(), 3);
    }

    #[test]
    fn summary_lists_failed_and_skipped_videos() {
        let stats = VideoStats {
            frames: 10,
            frames_with_detections: 4,
            boxes: 6,
            located_boxes: 5,
            missing_telemetry: 1,
            ..VideoStats::default()
        };

        let table = summary_table(&RunReport {
            videos: vec![("a".into(), Some(stats)), ("b".into(), None)],
            skipped: vec!["c".into()],
        });

        assert_eq!(table.len(), 3);
        assert!(table.to_string().contains("failed"));
        assert!(table.to_string().contains("skipped"));
    }
}
