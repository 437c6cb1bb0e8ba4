use std::path::PathBuf;

use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use serde::Serialize;

use route_refiner::pipeline::{PipelineResult, PipelineRunner, RunOutcome};
use route_refiner::RefinerConfig;

#[derive(Parser, Debug)]
#[command(name = "route_refiner")]
#[command(about = "Refine a day of GPS fixes and reconcile it with road routing", long_about = None)]
struct Args {
    /// Entity whose trajectory should be processed
    #[arg(value_name = "ENTITY_ID")]
    entity_id: String,

    /// Calendar day, YYYY-MM-DD
    #[arg(value_name = "DATE")]
    date: NaiveDate,

    /// JSON config file (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directions service access token
    #[arg(long, env = "ROUTE_REFINER_DIRECTIONS_TOKEN", hide_env_values = true)]
    directions_token: Option<String>,

    /// Snap-to-road service API key
    #[arg(long, env = "ROUTE_REFINER_SNAP_KEY", hide_env_values = true)]
    snap_key: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

/// What a map view needs: four point sequences and the distances.
#[derive(Serialize)]
struct Output<'a> {
    #[serde(flatten)]
    result: &'a PipelineResult,
    display_distance_m: f64,
}

fn load_config(args: &Args) -> Result<RefinerConfig> {
    let mut config = match &args.config {
        Some(path) => RefinerConfig::from_json_file(path)?,
        None => RefinerConfig::default(),
    };
    if let Some(token) = &args.directions_token {
        config.directions.access_token = token.clone();
    }
    if let Some(key) = &args.snap_key {
        config.snap.api_key = Some(key.clone());
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    if config.directions.access_token.is_empty() {
        log::warn!("No directions access token configured, routing requests will likely be rejected");
    }

    let runner = PipelineRunner::from_config(&config);
    let result = match runner.run(&args.entity_id, args.date).await {
        RunOutcome::Published(result) => result,
        RunOutcome::Superseded { generation } => {
            anyhow::bail!("run {} was superseded before it finished", generation)
        }
    };

    log::info!(
        "{} raw, {} refined, {} snapped, {} route points; {:.1} m ({:?})",
        result.raw.len(),
        result.refined.len(),
        result.snapped.len(),
        result.route.len(),
        result.display_distance_m(),
        result.status
    );

    let output = Output {
        result: &result,
        display_distance_m: result.display_distance_m(),
    };
    let json = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", json);

    Ok(())
}
