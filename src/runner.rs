use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context};
use gl_pipeline::{AttachedTelemetry, ClockedTrack, GeoLocationPipeline, VideoStats};
use gl_terrain::TerrainIndex;
use gl_types::Frame;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{detections, output, sources::VideoSource, video::FfProbe};

/// Where a video's detections and telemetry come from.
#[derive(Debug)]
pub enum JobInput {
    /// Raw video and subtitles, with detections from prediction files
    Sources {
        source: VideoSource,
        frames: Vec<Frame>,
    },

    /// Consolidated JSON whose frames already carry their telemetry
    Consolidated { path: PathBuf },
}

#[derive(Debug)]
pub struct VideoJob {
    pub name: String,
    pub input: JobInput,
}

/// Settings shared by every job of a run.
#[derive(Debug)]
pub struct RunSettings {
    pub camera_params: PathBuf,
    pub output: PathBuf,
    pub ffprobe: String,
}

impl RunSettings {
    fn camera_file(&self, video: &str) -> PathBuf {
        self.camera_params.join(format!("{}.txt", video))
    }
}

fn run_job(
    job: VideoJob,
    settings: &RunSettings,
    terrain: &TerrainIndex,
) -> anyhow::Result<VideoStats> {
    let VideoJob { name, input } = job;

    let camera_file = settings.camera_file(&name);
    let pipeline = GeoLocationPipeline::for_camera_file(&camera_file, terrain)
        .with_context(|| format!("failed to read camera parameters {}", camera_file.display()))?;

    let result = match input {
        JobInput::Sources { source, frames } => {
            let metadata = FfProbe::new(settings.ffprobe.as_str())
                .probe(&source.video)
                .context("failed to read video metadata")?;

            let track = gl_telemetry::read_from_path(&source.subtitles)
                .context("failed to read telemetry")?;

            let clock = ClockedTrack::new(&track, metadata.fps)?;
            pipeline.run(&name, &frames, &clock)
        }
        JobInput::Consolidated { path } => {
            let frames = detections::load_consolidated(&path)?;
            pipeline.run(&name, &frames, &AttachedTelemetry)
        }
    };

    output::write_results(&settings.output, &name, &result.frames)?;

    Ok(result.stats)
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Stats of every video that was started, in job order, with `None` for
    /// failures
    pub videos: Vec<(String, Option<VideoStats>)>,

    /// Videos that had not started when the run was cancelled
    pub skipped: Vec<String>,
}

/// Runs every job on the blocking pool, at most `parallelism` at a time.
/// Jobs that have not started when `cancel` fires are skipped.
pub async fn run_jobs(
    jobs: Vec<VideoJob>,
    settings: Arc<RunSettings>,
    terrain: Arc<TerrainIndex>,
    parallelism: usize,
    cancel: CancellationToken,
) -> RunReport {
    let parallelism = parallelism.max(1);
    let mut results: Vec<(String, Option<VideoStats>)> = Vec::with_capacity(jobs.len());
    let mut pending = jobs.into_iter().enumerate();
    let mut join_set = JoinSet::new();

    loop {
        while join_set.len() < parallelism && !cancel.is_cancelled() {
            let (slot, job) = match pending.next() {
                Some(next) => next,
                None => break,
            };

            debug!("starting {}", job.name);
            results.push((job.name.clone(), None));

            let settings = settings.clone();
            let terrain = terrain.clone();

            join_set.spawn_blocking(move || {
                let name = job.name.clone();
                let res = run_job(job, &settings, &terrain);
                (slot, name, res)
            });
        }

        let joined = match join_set.join_next().await {
            Some(joined) => joined,
            None => break,
        };

        // a panicked job keeps its `None` entry
        let (slot, name, res) = match joined {
            Ok(done) => done,
            Err(err) => {
                error!("video task failed: {}", err);
                continue;
            }
        };

        match res {
            Ok(stats) => {
                info!(
                    "{}: located {} of {} boxes",
                    name, stats.located_boxes, stats.boxes
                );
                results[slot].1 = Some(stats);
            }
            Err(err) => error!("{}: {:#}", name, err),
        }
    }

    let skipped: Vec<String> = pending.map(|(_, job)| job.name).collect();
    if !skipped.is_empty() {
        warn!("interrupted, skipped {} video(s)", skipped.len());
    }

    RunReport {
        videos: results,
        skipped,
    }
}

/// Fails unless every video ran to completion.
pub fn check_results(report: &RunReport) -> anyhow::Result<()> {
    let failed = report
        .videos
        .iter()
        .filter(|(_, stats)| stats.is_none())
        .count();
    let skipped = report.skipped.len();

    if failed > 0 || skipped > 0 {
        return Err(anyhow!(
            "{} failed and {} skipped of {} video(s)",
            failed,
            skipped,
            report.videos.len() + skipped
        ));
    }

    Ok(())
}
