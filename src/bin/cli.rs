//! zonepulse CLI - batch driver for the clustering and stability stages
//!
//! Usage:
//!   zonepulse-cli density --trips <file> --output <file>
//!   zonepulse-cli cluster --intensity <file> --coords <file> --output <file> [--zones-output <file> [--trips <file>]]
//!   zonepulse-cli flows --trips <file> --coords <file> --output <file>
//!   zonepulse-cli stability --assignments <file> --trips <file> --cache-dir <dir> --output <file>
//!
//! Every table is a JSON array of flat records. Logging goes to stderr,
//! summaries to stdout.

use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use serde::de::DeserializeOwned;
use serde::Serialize;
use zonepulse::{
    cluster::{attach_trip_averages, build_flows, cluster_flows, cluster_zones},
    features::{zone_hour_density, zone_totals},
    run_clustering, run_stability, schema,
    timeseries::JsonFileCache,
    AssignmentTable, ClusterAssignment, PipelineConfig, TripEvent, ZoneCoordinate,
    ZoneCoordinates, ZoneHourIntensity,
};

#[derive(Parser)]
#[command(name = "zonepulse-cli")]
#[command(about = "Space-time demand clustering and cluster stability metrics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON pipeline configuration (missing fields use defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Count trips per origin zone and pickup hour
    Density {
        /// Trip records
        #[arg(long)]
        trips: PathBuf,

        /// Output file for zone-hour intensities
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Cluster zone-hours and write the assignment table
    Cluster {
        /// Zone-hour intensity records
        #[arg(long)]
        intensity: PathBuf,

        /// Zone coordinates in projected meters
        #[arg(long)]
        coords: PathBuf,

        /// Output file for the assignment table
        #[arg(short, long)]
        output: PathBuf,

        /// Also cluster whole zones spatially and write them here
        #[arg(long)]
        zones_output: Option<PathBuf>,

        /// Trip records for zone fare and duration averages
        #[arg(long, requires = "zones_output")]
        trips: Option<PathBuf>,
    },

    /// Aggregate origin-destination flows and cluster them
    Flows {
        /// Trip records with destinations
        #[arg(long)]
        trips: PathBuf,

        /// Zone coordinates in projected meters
        #[arg(long)]
        coords: PathBuf,

        /// Output file for the clustered flows
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Score the temporal stability of every cluster
    Stability {
        /// Assignment table written by `cluster`
        #[arg(long)]
        assignments: PathBuf,

        /// Trip records (read only when the daily cache is missing)
        #[arg(long)]
        trips: PathBuf,

        /// Directory of the daily table cache
        #[arg(long, default_value = "cache")]
        cache_dir: PathBuf,

        /// Output file for series, metrics and summary
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> zonepulse::Result<()> {
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Density { trips, output } => {
            let trips: Vec<TripEvent> = read_table("trips", &trips, schema::TRIP_COLUMNS)?;
            let density = zone_hour_density(&trips);
            println!(
                "{} zone-hours from {} trips",
                density.len(),
                trips.len()
            );
            write_json(&output, &density)
        }
        Commands::Cluster {
            intensity,
            coords,
            output,
            zones_output,
            trips,
        } => {
            let records: Vec<ZoneHourIntensity> =
                read_table("intensity", &intensity, schema::INTENSITY_COLUMNS)?;
            let coords = read_coordinates(&coords)?;

            let result = run_clustering(&records, &coords, &config)?;
            println!("\n{}", "=".repeat(60));
            println!(
                "eps={:.1} ({}), clusters={}, assigned zone-hours={}",
                result.eps,
                if result.accepted { "accepted" } else { "fallback" },
                result.assignments.cluster_ids().len(),
                result.assignments.len()
            );
            for d in &result.demoted {
                println!(
                    "demoted cluster {} ({} points, {:.1}%)",
                    d.cluster_id,
                    d.size,
                    d.fraction * 100.0
                );
            }
            println!("{}", "=".repeat(60));
            write_json(&output, &result.assignments)?;

            if let Some(path) = zones_output {
                let mut zones = cluster_zones(&zone_totals(&records), &coords, &config.spatial)?;
                if let Some(trips) = trips {
                    let trips: Vec<TripEvent> = read_table("trips", &trips, schema::TRIP_COLUMNS)?;
                    attach_trip_averages(&mut zones, &trips);
                }
                write_json(&path, &zones)?;
            }
            Ok(())
        }
        Commands::Flows {
            trips,
            coords,
            output,
        } => {
            let trips: Vec<TripEvent> = read_table("trips", &trips, schema::FLOW_TRIP_COLUMNS)?;
            let coords = read_coordinates(&coords)?;

            let flows = build_flows(&trips);
            let clustered = cluster_flows(&flows, &coords, &config.flow)?;

            let mut ids: Vec<i32> = clustered
                .iter()
                .map(|c| c.flow_cluster_id)
                .filter(|&id| id >= 0)
                .collect();
            ids.sort_unstable();
            ids.dedup();
            println!(
                "{} OD flows from {} trips, {} clustered into {} flow clusters",
                flows.len(),
                trips.len(),
                clustered.len(),
                ids.len()
            );
            write_json(&output, &clustered)
        }
        Commands::Stability {
            assignments,
            trips,
            cache_dir,
            output,
        } => {
            let rows: Vec<ClusterAssignment> =
                read_table("assignments", &assignments, schema::ASSIGNMENT_COLUMNS)?;
            let table = AssignmentTable::from_rows(rows);
            let mut cache = JsonFileCache::new(cache_dir);

            let result = run_stability(
                &table,
                &mut cache,
                || read_table("trips", &trips, schema::TRIP_COLUMNS),
                &config,
            )?;

            println!("\n{}", "=".repeat(60));
            for s in &result.summary {
                println!(
                    "{:>5}: clusters={:<3} dtw={} ac1={} ac24={} snr={}",
                    s.metric_target,
                    s.clusters,
                    fmt_metric(s.dtw_daily_mean),
                    fmt_metric(s.autocorr_lag1),
                    fmt_metric(s.autocorr_lag24),
                    fmt_metric(s.snr_hourly)
                );
            }
            println!("{}", "=".repeat(60));
            write_json(&output, &result)
        }
    }
}

fn read_table<T: DeserializeOwned>(
    table: &'static str,
    path: &Path,
    columns: &'static [&'static str],
) -> zonepulse::Result<Vec<T>> {
    let text = fs::read_to_string(path)?;
    let rows = schema::parse_table(table, &text, columns)?;
    log::debug!("Loaded {} {} rows from {}", rows.len(), table, path.display());
    Ok(rows)
}

fn read_coordinates(path: &Path) -> zonepulse::Result<ZoneCoordinates> {
    Ok(
        read_table::<ZoneCoordinate>("coordinates", path, schema::COORDINATE_COLUMNS)?
            .into_iter()
            .collect(),
    )
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> zonepulse::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

fn fmt_metric(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.4}"))
}
