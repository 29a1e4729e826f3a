//! traceclean CLI - Debug tool for the trace cleaning pipeline
//!
//! Usage:
//!   traceclean-cli clean <payload.json> [--min-distance 5] [--impute-distance 3]
//!       [--impute-angle 120] [--map-match] [--interpolate] [--stops]
//!       [--output <file>]
//!
//! Reads a JSON trace payload, applies the selected cleaning operations in a
//! sensible order (proximity filter, imputers, map matching, interpolation,
//! stop detection) and prints the aggregated cleaning output as JSON.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use traceclean::{
    add_stop_events_info, impute_distorted_pings_with_angle,
    impute_distorted_pings_with_distance, interpolate_trace, map_match_trace,
    remove_nearby_pings, trace_cleaning_output, InterpolateConfig, MapMatchConfig, StopConfig,
    Trace, TracePayload,
};

#[derive(Parser)]
#[command(name = "traceclean-cli")]
#[command(about = "Debug tool for the GPS trace cleaning pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a trace payload and print the cleaning output
    Clean {
        /// JSON file with the trace payload
        payload: PathBuf,

        /// Drop pings closer than this to the previous retained ping (meters)
        #[arg(long)]
        min_distance: Option<f64>,

        /// Run the distance-ratio imputer with this max ratio
        #[arg(long)]
        impute_distance: Option<f64>,

        /// Run the angle imputer with this max turn angle (degrees)
        #[arg(long)]
        impute_angle: Option<f64>,

        /// Snap the trace onto the road network
        #[arg(long)]
        map_match: bool,

        /// OSRM match service endpoint
        #[arg(long, default_value = "http://127.0.0.1:5000/match/v1/driving/")]
        match_url: String,

        /// Interpolate missing pings along matched roads (needs --map-match)
        #[arg(long)]
        interpolate: bool,

        /// OSRM route service endpoint
        #[arg(long, default_value = "http://127.0.0.1:5000/route/v1/driving/")]
        route_url: String,

        /// Detect stop events
        #[arg(long)]
        stops: bool,

        /// Write the output JSON to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Clean {
            payload,
            min_distance,
            impute_distance,
            impute_angle,
            map_match,
            match_url,
            interpolate,
            route_url,
            stops,
            output,
        } => run_clean(
            &payload,
            min_distance,
            impute_distance,
            impute_angle,
            map_match.then_some(match_url),
            interpolate.then_some(route_url),
            stops,
            output.as_deref(),
            cli.verbose,
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn run_clean(
    payload_path: &PathBuf,
    min_distance: Option<f64>,
    impute_distance: Option<f64>,
    impute_angle: Option<f64>,
    match_url: Option<String>,
    route_url: Option<String>,
    stops: bool,
    output_path: Option<&std::path::Path>,
    verbose: bool,
) -> Result<(), String> {
    let body = fs::read_to_string(payload_path)
        .map_err(|e| format!("reading {}: {e}", payload_path.display()))?;
    let payload: TracePayload =
        serde_json::from_str(&body).map_err(|e| format!("parsing payload: {e}"))?;

    let mut trace = Trace::new(payload).map_err(|e| e.to_string())?;
    if verbose {
        println!("Loaded trace with {} pings", trace.len());
    }

    if let Some(min_distance) = min_distance {
        remove_nearby_pings(&mut trace, min_distance).map_err(|e| e.to_string())?;
    }
    if let Some(max_ratio) = impute_distance {
        impute_distorted_pings_with_distance(&mut trace, max_ratio).map_err(|e| e.to_string())?;
    }
    if let Some(max_delta_angle) = impute_angle {
        impute_distorted_pings_with_angle(&mut trace, max_delta_angle)
            .map_err(|e| e.to_string())?;
    }
    if let Some(osrm_url) = match_url {
        let config = MapMatchConfig {
            osrm_url,
            ..MapMatchConfig::default()
        };
        map_match_trace(&mut trace, &config).map_err(|e| e.to_string())?;
    }
    if let Some(osrm_url) = route_url {
        let config = InterpolateConfig {
            osrm_url,
            ..InterpolateConfig::default()
        };
        interpolate_trace(&mut trace, &config).map_err(|e| e.to_string())?;
    }
    if stops {
        add_stop_events_info(&mut trace, &StopConfig::default()).map_err(|e| e.to_string())?;
    }

    let output = trace_cleaning_output(&trace).map_err(|e| e.to_string())?;
    let json =
        serde_json::to_string_pretty(&output).map_err(|e| format!("serializing output: {e}"))?;

    match output_path {
        Some(path) => {
            fs::write(path, json).map_err(|e| format!("writing {}: {e}", path.display()))?;
            println!("Wrote cleaning output to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}
