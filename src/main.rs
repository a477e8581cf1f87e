//! flowctl: evaluate a DRL flow-control training run.
//!
//! Provides subcommands for each step of the post-processing:
//!
//! - `summarize` -- Per-episode reward and action statistics
//! - `select`    -- Pick the best policy and resolve its checkpoint
//! - `series`    -- Export drag, lift and expected action series for plotting
//! - `inspect`   -- Describe one observations file
//! - `reference` -- Print the open-loop sinusoidal rotation signal

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use flowctl::config::{EvalConfig, RewardEstimator};
use flowctl::evaluation::{time_range, EvaluationPipeline, SinusoidalRotation};
use flowctl::report::{write_json_file, write_summary, OutputFormat};
use flowctl::trajectory::{parse_trajectory, Trajectory};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// flowctl: evaluate a DRL flow-control training run
#[derive(Parser)]
#[command(name = "flowctl", version, about)]
struct Cli {
    /// Path to a JSON configuration file (uses defaults if not provided).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Training directory holding the per-episode artifacts.
    #[arg(long, global = true, default_value = ".")]
    dir: PathBuf,

    /// Expected number of episodes (discovered from the directory if omitted).
    #[arg(long, global = true)]
    episodes: Option<u32>,

    /// Load episodes in parallel.
    #[arg(long, global = true)]
    parallel: bool,

    /// Per-trajectory reward reduction.
    #[arg(long, global = true)]
    estimator: Option<RewardEstimator>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print per-episode statistics.
    Summarize {
        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Only show the best N episodes.
        #[arg(long)]
        top: Option<usize>,
    },

    /// Select the best policy.
    Select {
        /// Output format.
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also write the selection as JSON to this path.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Export drag, lift and expected action series for one episode.
    Series {
        /// Episode index (defaults to the selected best episode).
        #[arg(long)]
        episode: Option<u32>,

        /// Path to write the series JSON to.
        #[arg(long, default_value = "series.json")]
        output: PathBuf,

        /// Add an open-loop reference with this amplitude (rad/s).
        #[arg(long, requires = "reference_frequency")]
        reference_amplitude: Option<f64>,

        /// Frequency of the open-loop reference (Hz).
        #[arg(long, requires = "reference_amplitude")]
        reference_frequency: Option<f64>,
    },

    /// Describe one observations file.
    Inspect {
        /// Path to the observations JSON file.
        path: PathBuf,
    },

    /// Print the open-loop rotation omega(t) = A sin(2 pi f t + phi).
    Reference {
        #[arg(long)]
        amplitude: f64,

        #[arg(long)]
        frequency: f64,

        #[arg(long, default_value_t = 0.0)]
        phase: f64,

        #[arg(long, default_value_t = 0.0)]
        start: f64,

        #[arg(long)]
        end: f64,

        #[arg(long, default_value_t = 0.01)]
        step: f64,
    },
}

// ---------------------------------------------------------------------------
// Entrypoint
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    // Initialise tracing (reads RUST_LOG env var, defaults to info).
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    // Load or create configuration.
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            EvalConfig::from_json(&text)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        }
        None => EvalConfig::default(),
    };

    // Command-line flags take precedence over the config file.
    if cli.episodes.is_some() {
        config.loading.episodes = cli.episodes;
    }
    if cli.parallel {
        config.loading.parallel = true;
    }
    if let Some(estimator) = cli.estimator {
        config.selection.estimator = estimator;
    }

    match cli.command {
        Commands::Summarize { format, top } => cmd_summarize(config, &cli.dir, format, top),
        Commands::Select { format, output } => cmd_select(config, &cli.dir, format, output.as_deref()),
        Commands::Series {
            episode,
            output,
            reference_amplitude,
            reference_frequency,
        } => {
            let reference = reference_amplitude
                .zip(reference_frequency)
                .map(|(a, f)| SinusoidalRotation::new(a, f, 0.0));
            cmd_series(config, &cli.dir, episode, &output, reference)
        }
        Commands::Inspect { path } => cmd_inspect(&path),
        Commands::Reference {
            amplitude,
            frequency,
            phase,
            start,
            end,
            step,
        } => cmd_reference(SinusoidalRotation::new(amplitude, frequency, phase), start, end, step),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn build_pipeline(config: EvalConfig, dir: &Path) -> Result<EvaluationPipeline> {
    EvaluationPipeline::new(config, dir)
        .with_context(|| format!("Failed to set up evaluation of {}", dir.display()))
}

fn cmd_summarize(
    config: EvalConfig,
    dir: &Path,
    format: OutputFormat,
    top: Option<usize>,
) -> Result<()> {
    let pipeline = build_pipeline(config, dir)?;
    let (mut report, selection) = pipeline.evaluate()?;

    if let Some(n) = top {
        let keep: Vec<u32> = report.ranked().iter().take(n).map(|s| s.episode).collect();
        report.summaries.retain(|s| keep.contains(&s.episode));
    }

    write_summary(&report, Some(&selection), format, io::stdout().lock())?;
    Ok(())
}

fn cmd_select(
    config: EvalConfig,
    dir: &Path,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let top_k = config.selection.top_k;
    let pipeline = build_pipeline(config, dir)?;
    let (mut report, selection) = pipeline.evaluate()?;

    let keep: Vec<u32> = report.ranked().iter().take(top_k).map(|s| s.episode).collect();
    report.summaries.retain(|s| keep.contains(&s.episode));
    write_summary(&report, Some(&selection), format, io::stdout().lock())?;

    if let Some(path) = output {
        write_json_file(path, &selection)
            .with_context(|| format!("Failed to write selection to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Saved selection");
    }
    Ok(())
}

fn cmd_series(
    config: EvalConfig,
    dir: &Path,
    episode: Option<u32>,
    output: &Path,
    reference: Option<SinusoidalRotation>,
) -> Result<()> {
    let pipeline = build_pipeline(config, dir)?;
    let episode = match episode {
        Some(index) => index,
        None => pipeline.evaluate()?.1.episode,
    };

    let series = pipeline
        .episode_series(episode, reference.as_ref())
        .with_context(|| format!("Failed to extract series for episode {episode}"))?;
    write_json_file(output, &series)
        .with_context(|| format!("Failed to write series to {}", output.display()))?;

    tracing::info!(
        episode,
        trajectories = series.trajectories.len(),
        path = %output.display(),
        "Saved series"
    );
    Ok(())
}

fn cmd_inspect(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let root: serde_json::Value =
        serde_json::from_str(&text).context("Failed to parse observations")?;
    let records = match &root {
        serde_json::Value::Array(records) => records.as_slice(),
        serde_json::Value::Object(map) => map
            .get("trajectories")
            .and_then(|v| v.as_array())
            .map(|v| v.as_slice())
            .context("Object has no `trajectories` array")?,
        _ => anyhow::bail!("Expected an array of trajectories"),
    };

    println!("Observations: {}", path.display());
    println!("  Records: {}", records.len());
    println!();

    let mut valid = 0usize;
    for (position, record) in records.iter().enumerate() {
        match parse_trajectory(record) {
            Ok(t) => {
                valid += 1;
                println!(
                    "  [{position}] steps={} reward(mean)={:.6} reward(sum)={:.6} cd={} cl={} {}",
                    t.len(),
                    t.mean_reward(),
                    t.total_reward(),
                    t.cd.len(),
                    t.cl.len(),
                    optional_fields(&t)
                );
            }
            Err(reason) => println!("  [{position}] MALFORMED: {reason}"),
        }
    }

    println!();
    println!("  Valid: {valid}, malformed: {}", records.len() - valid);
    Ok(())
}

fn optional_fields(t: &Trajectory) -> String {
    let mut fields = Vec::new();
    if t.policy.is_some() {
        fields.push("alpha/beta");
    }
    if t.time.is_some() {
        fields.push("t");
    }
    if fields.is_empty() {
        String::new()
    } else {
        format!("[{}]", fields.join(", "))
    }
}

fn cmd_reference(rotation: SinusoidalRotation, start: f64, end: f64, step: f64) -> Result<()> {
    let time = time_range(start, end, step)?;
    let series = rotation.series(&time);

    println!("t,omega");
    for (t, omega) in series.time.iter().zip(&series.values) {
        println!("{t:.6},{omega:.6}");
    }
    if let Some(rms) = series.rms() {
        tracing::info!(rms, samples = series.len(), "Open-loop reference");
    }
    Ok(())
}
