use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, Context};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::{
    config::GeolocateConfig,
    runner::{JobInput, RunSettings, VideoJob},
};

#[macro_use]
extern crate tracing;

#[macro_use]
extern crate prettytable;

mod cli;
mod config;
mod detections;
mod output;
mod runner;
mod sources;
mod video;

/// Targets written to the log files at debug level.
const FILE_LOG_TARGETS: [&str; 7] = [
    "geolocate",
    "gl_camera",
    "gl_geodesy",
    "gl_pipeline",
    "gl_telemetry",
    "gl_terrain",
    "gl_types",
];

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    // setup colorful backtraces
    color_backtrace::install();

    let main_args: cli::args::MainArgs = cli::args::MainArgs::parse();

    let mut config = GeolocateConfig::read_from_path(&main_args.config)
        .with_context(|| format!("failed to read config file {}", main_args.config.display()))?;

    if let Some(output) = &main_args.output {
        config.output = output.clone();
    }

    let (writer, _guard) = tracing_appender::non_blocking(tracing_appender::rolling::hourly(
        &config.logs,
        "geolocate",
    ));

    tracing_subscriber::registry()
        // writer that outputs to console
        .with(tracing_subscriber::fmt::layer().with_filter(console_targets()?))
        // writer that outputs to files
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(
                    Targets::new().with_targets(
                        FILE_LOG_TARGETS
                            .iter()
                            .map(|target| (*target, LevelFilter::DEBUG)),
                    ),
                ),
        )
        .init();

    debug!("read config from {}", main_args.config.display());

    run(config, main_args).await
}

/// Console filter from `RUST_LOG`, given as comma separated `target=level`
/// or bare `level` directives. Defaults to info.
fn console_targets() -> anyhow::Result<Targets> {
    let mut targets = Targets::new().with_default(LevelFilter::INFO);

    if let Ok(directives) = std::env::var("RUST_LOG") {
        for directive in directives.split(',').filter(|d| !d.is_empty()) {
            if let Some((target, level)) = directive.split_once('=') {
                targets = targets.with_target(
                    target,
                    level.parse::<LevelFilter>().context("invalid log level")?,
                );
            } else {
                targets = targets.with_default(
                    directive
                        .parse::<LevelFilter>()
                        .context("invalid log level")?,
                );
            }
        }
    }

    Ok(targets)
}

async fn run(config: GeolocateConfig, main_args: cli::args::MainArgs) -> anyhow::Result<()> {
    let cancellation_token = CancellationToken::new();

    ctrlc::set_handler({
        let cancellation_token = cancellation_token.clone();
        move || {
            info!("received interrupt, finishing running videos");
            cancellation_token.cancel();
        }
    })
    .context("could not set ctrl+c handler")?;

    let selected: BTreeSet<String> = main_args.videos.iter().cloned().collect();

    let jobs = match &main_args.detections_json {
        Some(dir) => consolidated_jobs(dir, &selected)?,
        None => source_jobs(&config, &selected)?,
    };

    if jobs.is_empty() {
        warn!("no videos to process");
        return Ok(());
    }

    info!("loading terrain tiles from {}", config.terrain.display());
    let tiles = sources::terrain_tiles(&config.terrain).context("failed to list terrain tiles")?;
    if tiles.is_empty() {
        warn!("no terrain tiles found in {}", config.terrain.display());
    }

    let terrain = tokio::task::spawn_blocking(move || gl_terrain::TerrainIndex::load(&tiles))
        .await
        .context("terrain loading task failed")?
        .context("failed to load terrain tiles")?;

    let settings = RunSettings {
        camera_params: config.camera_params.clone(),
        output: config.output.clone(),
        ffprobe: config.video.ffprobe.clone(),
    };

    let parallelism = config.parallelism.unwrap_or(jobs.len());
    info!(
        "processing {} video(s), {} at a time",
        jobs.len(),
        parallelism
    );

    let report = runner::run_jobs(
        jobs,
        Arc::new(settings),
        Arc::new(terrain),
        parallelism,
        cancellation_token,
    )
    .await;

    output::summary_table(&report).printstd();

    runner::check_results(&report)
}

fn is_selected(selected: &BTreeSet<String>, name: &str) -> bool {
    selected.is_empty() || selected.contains(name)
}

fn source_jobs(
    config: &GeolocateConfig,
    selected: &BTreeSet<String>,
) -> anyhow::Result<Vec<VideoJob>> {
    let source_dirs = config
        .sources
        .as_ref()
        .ok_or_else(|| anyhow!("config has no sources and --detections-json was not given"))?;
    let predictions = config
        .predictions
        .as_ref()
        .ok_or_else(|| anyhow!("config has no predictions and --detections-json was not given"))?;

    let sources: Vec<_> = sources::pair_sources(&source_dirs.videos, &source_dirs.subtitles)?
        .into_iter()
        .filter(|source| is_selected(selected, &source.name))
        .collect();

    let names = sources.iter().map(|source| source.name.clone()).collect();
    let mut frames = detections::load_predictions(predictions, &names)?;

    Ok(sources
        .into_iter()
        .map(|source| VideoJob {
            name: source.name.clone(),
            input: JobInput::Sources {
                frames: frames.remove(&source.name).unwrap_or_default(),
                source,
            },
        })
        .collect())
}

fn consolidated_jobs(dir: &Path, selected: &BTreeSet<String>) -> anyhow::Result<Vec<VideoJob>> {
    let mut paths: Vec<PathBuf> = sources::walk_files(dir)?
        .into_iter()
        .filter(|path| sources::has_extension(path, "json"))
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .filter_map(|path| {
            let name = sources::file_stem(&path)?.to_owned();

            is_selected(selected, &name).then(|| VideoJob {
                name,
                input: JobInput::Consolidated { path },
            })
        })
        .collect())
}
