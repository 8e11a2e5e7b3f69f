use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PairingError {
    #[error("video {video} does not have a matching subtitles file (.srt)")]
    MissingSubtitles { video: PathBuf },

    #[error("could not read directory {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A video and the telemetry subtitles recorded alongside it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoSource {
    pub name: String,
    pub video: PathBuf,
    pub subtitles: PathBuf,
}

/// Every file below `dir`, in no particular order.
pub fn walk_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, PairingError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source| PairingError::Io { path, source }
    };

    let mut pending = vec![dir.as_ref().to_path_buf()];
    let mut files = Vec::new();

    while let Some(dir) = pending.pop() {
        trace!("scanning {}", dir.display());

        for entry in std::fs::read_dir(&dir).map_err(io_err(&dir))? {
            let path = entry.map_err(io_err(&dir))?.path();

            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }

    Ok(files)
}

pub fn file_stem(path: &Path) -> Option<&str> {
    path.file_stem().and_then(|stem| stem.to_str())
}

pub fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map_or(false, |e| e.eq_ignore_ascii_case(ext))
}

/// `.tif`/`.tiff` files below `dir`, sorted by path. The order decides which
/// tile wins where tiles overlap.
pub fn terrain_tiles(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>, PairingError> {
    let mut tiles: Vec<PathBuf> = walk_files(dir)?
        .into_iter()
        .filter(|path| has_extension(path, "tif") || has_extension(path, "tiff"))
        .collect();

    tiles.sort();
    Ok(tiles)
}

/// Matches every video to the `.srt` file with the same stem. Sources are
/// returned sorted by name.
pub fn pair_sources(
    videos: impl AsRef<Path>,
    subtitles: impl AsRef<Path>,
) -> Result<Vec<VideoSource>, PairingError> {
    let mut srt_files = BTreeMap::new();

    for path in walk_files(subtitles)? {
        match file_stem(&path) {
            Some(stem) if has_extension(&path, "srt") => {
                srt_files.insert(stem.to_owned(), path);
            }
            _ => warn!(
                "{} is not an .srt subtitles file, skipping it",
                path.display()
            ),
        }
    }

    let mut sources = BTreeMap::new();

    for video in walk_files(videos)? {
        let matched = file_stem(&video)
            .and_then(|stem| srt_files.get_key_value(stem))
            .map(|(name, subtitles)| (name.clone(), subtitles.clone()));

        let (name, subtitles) = match matched {
            Some(matched) => matched,
            None => return Err(PairingError::MissingSubtitles { video }),
        };

        sources.insert(
            name.clone(),
            VideoSource {
                name,
                video,
                subtitles,
            },
        );
    }

    info!("{} video(s) found with matching subtitles", sources.len());

    Ok(sources.into_values().collect())
}
