use std::{
    collections::{BTreeMap, BTreeSet},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{bail, Context};
use gl_telemetry::take_flight_state;
use gl_types::{BoundingBox, Frame, TelemetrySample};
use serde::{de::IgnoredAny, Deserialize};
use uom::si::{f64::Length, length::meter};

use crate::sources::{file_stem, has_extension, walk_files};

/// Splits a prediction file stem `<video>_<frame>` at its last underscore.
pub fn split_prediction_stem(stem: &str) -> Option<(&str, u64)> {
    let (video, frame) = stem.rsplit_once('_')?;
    Some((video, frame.parse().ok()?))
}

/// Parses YOLO label lines `class cx cy w h`. Any columns after the fifth,
/// such as a confidence score, are ignored.
pub fn parse_boxes(contents: &str) -> anyhow::Result<Vec<BoundingBox>> {
    let mut boxes = Vec::new();

    for (i, line) in contents.lines().enumerate() {
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.is_empty() {
            continue;
        }

        if fields.len() < 5 {
            bail!("line {}: expected 5 fields, found {}", i + 1, fields.len());
        }

        let class_id = fields[0]
            .parse::<i64>()
            .with_context(|| format!("line {}: invalid class {:?}", i + 1, fields[0]))?;

        let mut geometry = [0.; 4];
        for (value, field) in geometry.iter_mut().zip(&fields[1..5]) {
            *value = field
                .parse()
                .with_context(|| format!("line {}: invalid number {:?}", i + 1, field))?;
        }

        let [cx, cy, w, h] = geometry;
        boxes.push(BoundingBox::new(class_id, cx, cy, w, h));
    }

    Ok(boxes)
}

/// Reads every `<video>_<frame>.txt` file below `dir` and groups the boxes
/// into frames for each of `videos`. Every requested video gets an entry,
/// with its frames sorted by index.
pub fn load_predictions(
    dir: impl AsRef<Path>,
    videos: &BTreeSet<String>,
) -> anyhow::Result<BTreeMap<String, Vec<Frame>>> {
    let dir = dir.as_ref();
    let files = walk_files(dir).context("failed to list prediction files")?;

    let mut grouped: BTreeMap<String, BTreeMap<u64, Vec<BoundingBox>>> = videos
        .iter()
        .map(|video| (video.clone(), BTreeMap::new()))
        .collect();
    let mut unmatched = BTreeMap::<String, usize>::new();

    for path in files.iter().filter(|path| has_extension(path, "txt")) {
        let (video, frame) = match file_stem(path).and_then(split_prediction_stem) {
            Some(parsed) => parsed,
            None => {
                warn!("{} is not named <video>_<frame>.txt, skipping it", path.display());
                continue;
            }
        };

        let frames = match grouped.get_mut(video) {
            Some(frames) => frames,
            None => {
                *unmatched.entry(video.to_owned()).or_default() += 1;
                continue;
            }
        };

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let boxes = parse_boxes(&contents)
            .with_context(|| format!("failed to parse predictions in {}", path.display()))?;

        frames.insert(frame, boxes);
    }

    for (video, count) in unmatched {
        warn!(
            "skipped {} prediction file(s) for {}, which has no matching source",
            count, video
        );
    }

    Ok(grouped
        .into_iter()
        .map(|(video, frames)| {
            debug!("{} has {} frame(s) with predictions", video, frames.len());

            let frames = frames
                .into_iter()
                .map(|(index, boxes)| Frame::new(index, boxes))
                .collect();

            (video, frames)
        })
        .collect())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BoxEntry {
    Plain([f64; 5]),
    Located([f64; 5], IgnoredAny),
}

impl BoxEntry {
    fn into_box(self) -> BoundingBox {
        let [class_id, cx, cy, w, h] = match self {
            BoxEntry::Plain(values) | BoxEntry::Located(values, _) => values,
        };

        BoundingBox::new(class_id as i64, cx, cy, w, h)
    }
}

type ConsolidatedFrame = (Vec<BoxEntry>, BTreeMap<String, f64>);

/// Reads a consolidated per-video JSON file: an object keyed by frame
/// index, each value a pair of detections and telemetry fields. A telemetry
/// object with at most one field is a placeholder and counts as absent, but
/// its `Timestamp` is kept on the frame.
/// Detections that already carry a location are accepted and the location is
/// recomputed.
pub fn load_consolidated(path: impl AsRef<Path>) -> anyhow::Result<Vec<Frame>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;

    let entries: BTreeMap<String, ConsolidatedFrame> =
        serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse {}", path.display()))?;

    let mut frames = entries
        .into_iter()
        .map(|(key, (boxes, fields))| {
            let index = key
                .parse::<u64>()
                .with_context(|| format!("invalid frame index {:?}", key))?;

            let timestamp = fields.get("Timestamp").copied();
            let telemetry = consolidated_telemetry(fields)
                .with_context(|| format!("invalid telemetry for frame {}", index))?;

            let boxes = boxes.into_iter().map(BoxEntry::into_box).collect();

            Ok(Frame::new(index, boxes)
                .with_telemetry(telemetry)
                .with_timestamp(timestamp))
        })
        .collect::<anyhow::Result<Vec<_>>>()
        .with_context(|| format!("failed to load {}", path.display()))?;

    frames.sort_by_key(|frame| frame.index);

    Ok(frames)
}

fn consolidated_telemetry(
    mut fields: BTreeMap<String, f64>,
) -> anyhow::Result<Option<TelemetrySample>> {
    if fields.len() <= 1 {
        return Ok(None);
    }

    let state = match take_flight_state(&mut fields) {
        Ok(state) => state,
        Err(key) => bail!("missing {}", key),
    };

    let timestamp = fields.get("Timestamp").copied().unwrap_or_default();
    let sample = TelemetrySample::new(state, timestamp);

    Ok(Some(match fields.get("Height") {
        Some(&elevation) => sample.with_terrain_elevation(Length::new::<meter>(elevation)),
        None => sample,
    }))
}
