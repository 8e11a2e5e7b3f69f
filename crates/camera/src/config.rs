use std::path::Path;

use thiserror::Error;
use tracing::debug;

use crate::CameraModel;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("the key {key:?} in {source_name} is not a recognised argument, expected width, height or dfov (i.e. width=3600)")]
    UnknownKey { key: String, source_name: String },

    #[error("invalid value {value:?} for {key} in {source_name}")]
    InvalidValue {
        key: &'static str,
        value: String,
        source_name: String,
    },

    #[error("missing {key} in {source_name}")]
    MissingKey {
        key: &'static str,
        source_name: String,
    },

    #[error("line {line:?} in {source_name} is not a key=value pair")]
    MalformedLine { line: String, source_name: String },

    #[error("could not read camera configuration {source_name}")]
    Io {
        source_name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Camera intrinsics for a single video.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraParameters {
    /// Sensor width in pixels
    pub pixel_width: u32,

    /// Sensor height in pixels
    pub pixel_height: u32,

    /// Diagonal field of view in degrees
    pub dfov_degrees: f64,
}

impl CameraParameters {
    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source_name = path.display().to_string();

        debug!("opening camera configuration file {}", source_name);

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            source_name: source_name.clone(),
            source,
        })?;

        Self::load(contents.lines(), &source_name)
    }

    /// Parses `key=value` lines. `source_name` only appears in error
    /// messages. Later values override earlier ones.
    pub fn load<I, S>(lines: I, source_name: &str) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut width = None;
        let mut height = None;
        let mut dfov = None;

        for line in lines {
            let line = line.as_ref().trim();
            if line.is_empty() {
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| ConfigError::MalformedLine {
                    line: line.to_owned(),
                    source_name: source_name.to_owned(),
                })?;

            let (key, value) = (key.trim(), value.trim());

            match key {
                "width" => width = Some(parse_dimension("width", value, source_name)?),
                "height" => height = Some(parse_dimension("height", value, source_name)?),
                "dfov" => dfov = Some(parse_dfov(value, source_name)?),
                other => {
                    return Err(ConfigError::UnknownKey {
                        key: other.to_owned(),
                        source_name: source_name.to_owned(),
                    })
                }
            }
        }

        let missing = |key| ConfigError::MissingKey {
            key,
            source_name: source_name.to_owned(),
        };

        Ok(CameraParameters {
            pixel_width: width.ok_or_else(|| missing("width"))?,
            pixel_height: height.ok_or_else(|| missing("height"))?,
            dfov_degrees: dfov.ok_or_else(|| missing("dfov"))?,
        })
    }

    /// Computes the angular resolution and principal point. Done once per
    /// video, the result is reused for every frame.
    pub fn derive(&self) -> CameraModel {
        CameraModel::new(*self)
    }
}

fn parse_dimension(key: &'static str, value: &str, source_name: &str) -> Result<u32, ConfigError> {
    match value.parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_owned(),
            source_name: source_name.to_owned(),
        }),
    }
}

fn parse_dfov(value: &str, source_name: &str) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(ConfigError::InvalidValue {
            key: "dfov",
            value: value.to_owned(),
            source_name: source_name.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn loads_all_keys() {
        let params = CameraParameters::load(["width=4000", " height = 3000 ", "dfov=84.0"], "cam.txt")
            .unwrap();

        assert_eq!(
            params,
            CameraParameters {
                pixel_width: 4000,
                pixel_height: 3000,
                dfov_degrees: 84.0,
            }
        );
    }

    #[test]
    fn ignores_blank_lines() {
        let params =
            CameraParameters::load(["", "width=640", "height=480", "", "dfov=60"], "cam.txt").unwrap();
        assert_eq!(params.pixel_width, 640);
        assert_eq!(params.dfov_degrees, 60.0);
    }

    #[test]
    fn unknown_key_names_key_and_file() {
        let err = CameraParameters::load(["width=4000", "fov=84"], "DJI_0001.txt").unwrap_err();

        match &err {
            ConfigError::UnknownKey { key, source_name } => {
                assert_eq!(key, "fov");
                assert_eq!(source_name, "DJI_0001.txt");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let message = err.to_string();
        assert!(message.contains("fov"));
        assert!(message.contains("DJI_0001.txt"));
    }

    #[test]
    fn rejects_non_positive_values() {
        for lines in [
            ["width=0", "height=3000", "dfov=84"],
            ["width=4000", "height=-3", "dfov=84"],
            ["width=4000", "height=3000", "dfov=0"],
            ["width=4000.5", "height=3000", "dfov=84"],
            ["width=4000", "height=3000", "dfov=wide"],
        ] {
            let err = CameraParameters::load(lines, "cam.txt").unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { .. }),
                "{lines:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn missing_key_is_reported() {
        let err = CameraParameters::load(["width=4000", "height=3000"], "cam.txt").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { key: "dfov", .. }));
    }

    #[test]
    fn line_without_separator_is_malformed() {
        let err = CameraParameters::load(["width"], "cam.txt").unwrap_err();
        assert!(matches!(err, ConfigError::MalformedLine { .. }));
    }

    #[test]
    fn reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "width=4000\nheight=3000\ndfov=84.0").unwrap();

        let params = CameraParameters::read_from_path(file.path()).unwrap();
        assert_eq!(params.pixel_height, 3000);
    }
}
