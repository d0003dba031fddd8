//! Collision Insights - headless dashboard driver
//!
//! Runs one render pass over a collision table and prints the dashboard
//! snapshot as JSON.

use anyhow::Context;
use clap::{ArgAction, Parser};
use collision_insights::config::{
    DEFAULT_DATA_PATH, DEFAULT_EXPORT_PATH, DEFAULT_ROW_LIMIT, MAX_INJURED_SELECTION,
};
use collision_insights::data::AffectedClass;
use collision_insights::{Dashboard, DataSource, DatasetCache, RecordLoader, Selections, Upload};
use log::LevelFilter;
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(version, about = "Motor vehicle collision dashboard pipeline")]
struct Cli {
    /// Default collision table.
    #[arg(long, env = "COLLISION_DATA", default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,

    /// User-supplied table; takes precedence over --data.
    #[arg(long, env = "COLLISION_UPLOAD")]
    upload: Option<PathBuf>,

    /// Maximum number of rows read from the table.
    #[arg(long, env = "COLLISION_ROW_LIMIT", default_value_t = DEFAULT_ROW_LIMIT)]
    rows: usize,

    /// Minimum persons injured for a collision to appear on the map.
    #[arg(
        long,
        default_value_t = 0,
        value_parser = clap::value_parser!(u32).range(0..=i64::from(MAX_INJURED_SELECTION))
    )]
    min_injured: u32,

    /// Hour of day to look at.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..=23))]
    hour: u32,

    /// Affected class for the injury ranking.
    #[arg(long, default_value = "Pedestrians")]
    injury_class: AffectedClass,

    /// Affected class for the fatality ranking.
    #[arg(long, default_value = "Pedestrians Killed")]
    fatality_class: AffectedClass,

    /// Include the hour-filtered records in the snapshot.
    #[arg(long)]
    raw: bool,

    /// Coordinate export file.
    #[arg(long, env = "COLLISION_EXPORT", default_value = DEFAULT_EXPORT_PATH)]
    export: PathBuf,

    /// Skip the coordinate export.
    #[arg(long)]
    no_export: bool,

    /// Write the snapshot here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Warn,
            (false, 0) => LevelFilter::Info,
            (false, 1) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }

    fn selections(&self) -> Selections {
        Selections {
            row_limit: self.rows,
            min_injured: self.min_injured,
            hour: self.hour,
            injury_class: self.injury_class,
            fatality_class: self.fatality_class,
            show_raw_data: self.raw,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    SimpleLogger::new().with_level(cli.log_level()).init()?;

    let upload = cli
        .upload
        .as_ref()
        .map(Upload::from_path)
        .transpose()
        .context("Cannot read uploaded table")?;
    let source = DataSource::from_upload(upload);

    let loader = RecordLoader::new(&cli.data, Arc::new(DatasetCache::new()));
    let mut dashboard = Dashboard::new(loader);
    if !cli.no_export {
        dashboard = dashboard.with_export_path(&cli.export);
    }

    let snapshot = dashboard
        .render(&source, &cli.selections())
        .context("Dashboard rendering halted")?;
    let json = serde_json::to_string_pretty(&snapshot)?;

    match &cli.output {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Cannot write snapshot to {}", path.display()))?,
        None => println!("{json}"),
    }

    Ok(())
}
