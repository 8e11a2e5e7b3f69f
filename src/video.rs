use std::{path::Path, process::Command};

use anyhow::{anyhow, bail, Context};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VideoMetadata {
    pub fps: f64,
    pub frame_count: u64,
}

impl VideoMetadata {
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.fps
    }
}

/// Reads frame rate and frame count of the first video stream with ffprobe.
pub struct FfProbe {
    ffprobe_path: String,
}

impl FfProbe {
    pub fn new(ffprobe_path: impl Into<String>) -> Self {
        FfProbe {
            ffprobe_path: ffprobe_path.into(),
        }
    }

    pub fn probe(&self, video: impl AsRef<Path>) -> anyhow::Result<VideoMetadata> {
        let video = video.as_ref();

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_streams",
                "-select_streams",
                "v:0",
                "-count_frames",
            ])
            .arg(video)
            .output()
            .with_context(|| format!("failed to execute {}", self.ffprobe_path))?;

        if !output.status.success() {
            bail!(
                "ffprobe failed on {}: {}",
                video.display(),
                String::from_utf8_lossy(&output.stderr)
            );
        }

        let metadata = parse_probe_output(&output.stdout)
            .with_context(|| format!("unexpected ffprobe output for {}", video.display()))?;

        let duration = metadata.duration_secs();
        info!(
            "{}: {} fps, {} frames, duration {:.1} ms ({}:{:06.3})",
            video.display(),
            metadata.fps,
            metadata.frame_count,
            duration * 1000.,
            (duration / 60.) as u64,
            duration % 60.
        );

        Ok(metadata)
    }
}

pub fn parse_probe_output(stdout: &[u8]) -> anyhow::Result<VideoMetadata> {
    let json: Value = serde_json::from_slice(stdout)?;

    let stream = json["streams"]
        .as_array()
        .and_then(|s| s.first())
        .ok_or_else(|| anyhow!("no video stream found"))?;

    let fps = stream["r_frame_rate"]
        .as_str()
        .and_then(parse_frame_rate)
        .ok_or_else(|| anyhow!("missing or invalid r_frame_rate"))?;

    if !(fps.is_finite() && fps > 0.) {
        bail!("invalid frame rate {}", fps);
    }

    let frame_count = ["nb_frames", "nb_read_frames"]
        .iter()
        .find_map(|key| stream[*key].as_str().and_then(|n| n.parse::<u64>().ok()))
        .ok_or_else(|| anyhow!("missing frame count"))?;

    Ok(VideoMetadata { fps, frame_count })
}

/// Parses a frame rate given as `num/den` or a plain number.
pub fn parse_frame_rate(rate: &str) -> Option<f64> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            (den != 0.).then(|| num / den)
        }
        None => rate.trim().parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn parses_frame_rates() {
        assert_relative_eq!(parse_frame_rate("30000/1001").unwrap(), 29.97, epsilon = 1e-3);
        assert_eq!(parse_frame_rate("25"), Some(25.));
        assert_eq!(parse_frame_rate("30/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }

    #[test]
    fn reads_stream_metadata() {
        let stdout = br#"{
            "streams": [{
                "index": 0,
                "codec_name": "h264",
                "r_frame_rate": "30/1",
                "nb_frames": "900",
                "nb_read_frames": "899"
            }]
        }"#;

        let metadata = parse_probe_output(stdout).unwrap();

        assert_eq!(metadata, VideoMetadata { fps: 30., frame_count: 900 });
        assert_relative_eq!(metadata.duration_secs(), 30.);
    }

    #[test]
    fn falls_back_to_counted_frames() {
        let stdout = br#"{"streams": [{"r_frame_rate": "24", "nb_read_frames": "48"}]}"#;

        assert_eq!(parse_probe_output(stdout).unwrap().frame_count, 48);
    }

    #[test]
    fn rejects_missing_stream_or_rate() {
        assert!(parse_probe_output(br#"{"streams": []}"#).is_err());
        assert!(parse_probe_output(br#"{"streams": [{"nb_frames": "10"}]}"#).is_err());
        assert!(parse_probe_output(br#"{"streams": [{"r_frame_rate": "0/1", "nb_frames": "10"}]}"#).is_err());
    }
}
