//! paretrack CLI: compare experiment runs across several metrics.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use paretrack_core::presentation::{axis_label, format_metric_value};
use paretrack_core::series::metric_series_for_run;
use paretrack_core::{
    analyze_frontier, build_run_metric_vectors, group_metric_series, order_frontier_points,
    storage, validate_objectives, MetricEvent, ObjectiveSpec, RunMetricVector,
};
use paretrack_server::{serve, FrontierReport, ServerConfig};

#[derive(Parser)]
#[command(
    name = "paretrack",
    about = "paretrack: find the best trade-offs among experiment runs",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the metric keys reported by any run
    Keys {
        /// Event file (.json/.yaml/.parquet), run directory or experiment directory
        source: PathBuf,
    },
    /// Show the latest value of every metric per run
    Vectors {
        /// Event file (.json/.yaml/.parquet), run directory or experiment directory
        source: PathBuf,
        /// Output format
        #[arg(long, short, default_value = "table", value_parser = ["table", "json"])]
        format: String,
    },
    /// Compute the Pareto frontier over 1 to 3 objectives
    Frontier {
        /// Event file (.json/.yaml/.parquet), run directory or experiment directory
        source: PathBuf,
        /// Objective as <key>:<max|min>; repeat for up to three axes
        #[arg(long = "objective", short = 'o', required = true)]
        objectives: Vec<ObjectiveSpec>,
        /// Output format
        #[arg(long, short, default_value = "table", value_parser = ["table", "json"])]
        format: String,
        /// Also list dominated and excluded runs
        #[arg(long)]
        all: bool,
    },
    /// Print the time series of one metric
    Series {
        /// Event file (.json/.yaml/.parquet), run directory or experiment directory
        source: PathBuf,
        /// Metric key
        #[arg(long, short)]
        key: String,
        /// Only this run
        #[arg(long, short)]
        run: Option<String>,
    },
    /// Rewrite events as a .json, .yaml or .parquet event file, or as an
    /// experiment directory when the destination has no extension
    Convert {
        /// Event file, run directory or experiment directory
        source: PathBuf,
        /// Destination file or experiment directory
        dest: PathBuf,
    },
    /// Start the JSON API server
    Serve {
        /// Path to experiments directory
        #[arg(default_value = "./experiments")]
        dir: PathBuf,
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind to
        #[arg(long, short, default_value_t = 8000)]
        port: u16,
        /// Memoized results kept per table (0 disables caching)
        #[arg(long, default_value_t = 64)]
        cache_capacity: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Keys { source } => cmd_keys(&source)?,
        Commands::Vectors { source, format } => cmd_vectors(&source, &format)?,
        Commands::Frontier { source, objectives, format, all } => {
            cmd_frontier(&source, &objectives, &format, all)?;
        }
        Commands::Series { source, key, run } => cmd_series(&source, &key, run.as_deref())?,
        Commands::Convert { source, dest } => cmd_convert(&source, &dest)?,
        Commands::Serve { dir, host, port, cache_capacity } => {
            cmd_serve(dir, host, port, cache_capacity).await?;
        }
    }

    Ok(())
}

// ─── Command implementations ──────────────────────────────────────────────────

fn load(source: &Path) -> Result<Vec<MetricEvent>> {
    if !source.exists() {
        anyhow::bail!("Source not found: {}", source.display());
    }
    let events = storage::load_events(source)?;
    info!(source = %source.display(), events = events.len(), "loaded metric events");
    Ok(events)
}

fn cmd_keys(source: &Path) -> Result<()> {
    let table = build_run_metric_vectors(&load(source)?);
    if table.keys.is_empty() {
        println!("No metrics found in '{}'", source.display());
        return Ok(());
    }
    for key in &table.keys {
        println!("{}", key);
    }
    Ok(())
}

fn cmd_vectors(source: &Path, format: &str) -> Result<()> {
    let table = build_run_metric_vectors(&load(source)?);

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }
    if table.is_empty() {
        println!("No runs with metric values in '{}'", source.display());
        return Ok(());
    }

    let mut out = Table::new();
    out.load_preset(UTF8_FULL);
    let mut header = vec!["Run".to_string()];
    header.extend(table.keys.iter().cloned());
    out.set_header(header);

    for vector in &table.vectors {
        let mut row = vec![vector.run_id.clone()];
        row.extend(table.keys.iter().map(|k| cell(vector, k)));
        out.add_row(row);
    }

    println!("{}", out);
    Ok(())
}

fn cmd_frontier(source: &Path, objectives: &[ObjectiveSpec], format: &str, all: bool) -> Result<()> {
    validate_objectives(objectives)?;
    let table = build_run_metric_vectors(&load(source)?);

    for objective in objectives {
        if !table.keys.contains(&objective.key) {
            warn!(key = %objective.key, "no run reports this metric");
        }
    }

    let analysis = analyze_frontier(&table.vectors, objectives);

    if format == "json" {
        let report = FrontierReport::new(&table, &analysis, objectives);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if analysis.candidate_count() == 0 {
        println!("No runs with complete data for the selected metrics");
        return Ok(());
    }

    let mut out = Table::new();
    out.load_preset(UTF8_FULL);
    let mut header = vec!["Run".to_string()];
    header.extend(objectives.iter().map(axis_label));
    header.push("Status".to_string());
    out.set_header(header);

    let mut push = |vector: &RunMetricVector, status: &str| {
        let mut row = vec![vector.run_id.clone()];
        row.extend(objectives.iter().map(|o| cell(vector, &o.key)));
        row.push(status.to_string());
        out.add_row(row);
    };

    for vector in order_frontier_points(&table.vectors, objectives, &analysis.frontier) {
        push(vector, "frontier");
    }
    if all {
        for vector in table.vectors.iter().filter(|v| analysis.dominated.contains(&v.run_id)) {
            push(vector, "dominated");
        }
        for vector in table.vectors.iter().filter(|v| analysis.excluded.contains(&v.run_id)) {
            push(vector, "excluded");
        }
    }

    println!(
        "Pareto frontier: {} of {} runs ({} excluded for missing metrics)",
        analysis.frontier.len(),
        analysis.candidate_count(),
        analysis.excluded.len()
    );
    println!("{}", out);
    Ok(())
}

fn cmd_series(source: &Path, key: &str, run: Option<&str>) -> Result<()> {
    let events = load(source)?;
    let grouped = match run {
        Some(run_id) => metric_series_for_run(&events, run_id),
        None => group_metric_series(&events),
    };
    let Some(points) = grouped.get(key) else {
        anyhow::bail!("No series for metric '{}'", key);
    };

    let mut out = Table::new();
    out.load_preset(UTF8_FULL);
    out.set_header(["Time", "Run", key]);
    for point in points {
        out.add_row([
            point.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            point.run_id.clone(),
            point
                .value
                .map(format_metric_value)
                .unwrap_or_else(|| "-".to_string()),
        ]);
    }

    println!("{}", out);
    Ok(())
}

fn cmd_convert(source: &Path, dest: &Path) -> Result<()> {
    let events = load(source)?;
    if dest.extension().is_none() {
        let runs = storage::write_experiment(dest, &events)?;
        println!(
            "Converted {} events into {} runs under {}",
            events.len(),
            runs,
            dest.display()
        );
        return Ok(());
    }
    storage::write_event_file(dest, &events)?;
    println!("Converted {} events to {}", events.len(), dest.display());
    Ok(())
}

async fn cmd_serve(dir: PathBuf, host: String, port: u16, cache_capacity: usize) -> Result<()> {
    println!("paretrack API");
    println!("   Experiments: {}", dir.display());
    println!("   URL:         http://{}:{}/api", host, port);
    println!();

    let config = ServerConfig {
        base_dir: dir,
        host,
        port,
        cache_capacity,
    };
    serve(config).await?;
    Ok(())
}

// ─── Utilities ────────────────────────────────────────────────────────────────

fn cell(vector: &RunMetricVector, key: &str) -> String {
    vector
        .get(key)
        .map(format_metric_value)
        .unwrap_or_else(|| "-".to_string())
}
