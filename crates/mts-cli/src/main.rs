//! MTS CLI

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mts_core::{
    AggregateOptions, DatasetArtifact, DatasetJob, OutlierTrim, PairPolicy, ProduceOptions, Region,
    VariablePolicy, policy, produce_all, produce_dataset, read_artifact,
};
use mts_viz::{SeriesMeta, comparison_artifact, write_comparison};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mts")]
#[command(about = "MTS - split-track residual comparisons for alignment validation")]
#[command(version)]
struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: tracing::Level,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate one splitter dataset into a histogram artifact
    Produce {
        /// Parquet file with the splitter tree columns
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset id (artifact file stem)
        #[arg(short, long)]
        name: String,

        /// Output directory for `<name>.json`
        #[arg(long)]
        out_dir: PathBuf,

        /// Fraction of central samples kept for mean/stdDev (0 or absent: no trimming)
        #[arg(long)]
        outlier: Option<f64>,

        #[command(flatten)]
        booking: BookingArgs,

        /// Binning policy JSON (default: built-in table)
        #[arg(long)]
        policy: Option<PathBuf>,
    },

    /// Overlay several dataset artifacts into one comparison artifact
    Compare {
        /// Dataset artifacts, in legend order
        #[arg(long = "artifact", required = true)]
        artifacts: Vec<PathBuf>,

        /// Legend entry per artifact (default: dataset id)
        #[arg(long = "title")]
        titles: Vec<String>,

        /// ROOT color index per artifact
        #[arg(long = "color")]
        colors: Vec<i32>,

        /// ROOT marker style per artifact
        #[arg(long = "style")]
        styles: Vec<i32>,

        #[arg(long, default_value = "")]
        legend_title: String,

        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Produce every dataset of a run config, then compare them
    Run {
        /// Run config (JSON)
        #[arg(long)]
        config: PathBuf,
    },

    /// Print the built-in binning policy as JSON
    Policy {
        /// Output file (pretty JSON). Defaults to stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print version
    Version,
}

#[derive(Clone, Copy, ValueEnum)]
enum RegionArg {
    Full,
    Pixel,
}

#[derive(Clone, Copy, ValueEnum)]
enum PairsArg {
    All,
    Lower,
}

#[derive(clap::Args)]
struct BookingArgs {
    /// Detector region the binning is chosen for
    #[arg(long, value_enum, default_value = "pixel")]
    region: RegionArg,

    /// 2D correlations: every ordered pair, or only k < j
    #[arg(long, value_enum, default_value = "all")]
    pairs: PairsArg,
}

impl BookingArgs {
    fn options(&self) -> AggregateOptions {
        AggregateOptions {
            region: match self.region {
                RegionArg::Full => Region::Full,
                RegionArg::Pixel => Region::Pixel,
            },
            pairs: match self.pairs {
                PairsArg::All => PairPolicy::All,
                PairsArg::Lower => PairPolicy::Lower,
            },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries command output.
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Produce { input, name, out_dir, outlier, booking, policy } => {
            let options = ProduceOptions {
                aggregate: booking.options(),
                trim: OutlierTrim::from_option(outlier),
                out_dir,
            };
            cmd_produce(DatasetJob { name, input }, policy.as_deref(), &options)
        }
        Commands::Compare { artifacts, titles, colors, styles, legend_title, output } => {
            cmd_compare(&artifacts, &titles, &colors, &styles, &legend_title, output.as_deref())
        }
        Commands::Run { config } => cmd_run(&config),
        Commands::Policy { output } => {
            write_json(output.as_deref(), serde_json::to_value(policy::builtin())?)
        }
        Commands::Version => {
            println!("mts {}", mts_core::VERSION);
            Ok(())
        }
    }
}

fn load_policy(path: Option<&Path>) -> Result<VariablePolicy> {
    match path {
        Some(p) => {
            tracing::info!(path = %p.display(), "loading binning policy");
            VariablePolicy::from_json_file(p)
                .with_context(|| format!("failed to load policy {}", p.display()))
        }
        None => Ok(policy::builtin().clone()),
    }
}

fn cmd_produce(job: DatasetJob, policy: Option<&Path>, options: &ProduceOptions) -> Result<()> {
    options.trim.validate()?;
    let policy = load_policy(policy)?;
    let handle = produce_dataset(&job, &policy, options)
        .with_context(|| format!("dataset '{}'", job.name))?;
    tracing::info!(dataset = %handle.dataset, path = %handle.path.display(), "artifact written");
    println!("{}", handle.path.display());
    Ok(())
}

/// Per-artifact presentation: explicit values where given, defaults otherwise.
fn series_for(
    artifacts: &[DatasetArtifact],
    titles: &[String],
    colors: &[i32],
    styles: &[i32],
) -> Result<Vec<SeriesMeta>> {
    let n = artifacts.len();
    for (flag, len) in [("--title", titles.len()), ("--color", colors.len()), ("--style", styles.len())]
    {
        if len != 0 && len != n {
            anyhow::bail!("{flag} given {len} times for {n} artifacts");
        }
    }
    Ok(artifacts
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let title = titles.get(i).cloned().unwrap_or_else(|| a.meta.dataset.clone());
            let mut meta = SeriesMeta::with_defaults(title, i);
            if let Some(&c) = colors.get(i) {
                meta.color = c;
            }
            if let Some(&s) = styles.get(i) {
                meta.marker_style = s;
            }
            meta
        })
        .collect())
}

fn cmd_compare(
    paths: &[PathBuf],
    titles: &[String],
    colors: &[i32],
    styles: &[i32],
    legend_title: &str,
    output: Option<&Path>,
) -> Result<()> {
    let artifacts = paths
        .iter()
        .map(|p| read_artifact(p).with_context(|| format!("failed to read {}", p.display())))
        .collect::<Result<Vec<_>>>()?;
    let series = series_for(&artifacts, titles, colors, styles)?;
    let comparison = comparison_artifact(&artifacts, &series, legend_title)?;
    tracing::info!(overlays = comparison.overlays.len(), "comparison built");

    match output {
        Some(path) => write_comparison(path, &comparison)?,
        None => println!("{}", serde_json::to_string_pretty(&comparison)?),
    }
    Ok(())
}

fn cmd_run(config: &Path) -> Result<()> {
    let cfg = config::read_run_config(config)?;
    let options = cfg.produce_options();
    options.trim.validate()?;
    let policy = load_policy(cfg.policy.as_deref())?;

    if cfg.threads > 0 {
        // Best-effort; ignore if a global pool was already installed.
        let _ = rayon::ThreadPoolBuilder::new().num_threads(cfg.threads).build_global();
    }

    let jobs = cfg.jobs();
    tracing::info!(datasets = jobs.len(), out_dir = %cfg.out_dir.display(), "starting run");
    let outcomes = produce_all(&jobs, &policy, &options);

    let mut artifacts = Vec::new();
    let mut series = Vec::new();
    let mut report = Vec::new();
    let mut failed = 0usize;
    for (i, (outcome, dataset)) in outcomes.into_iter().zip(&cfg.datasets).enumerate() {
        match outcome.result {
            Ok(handle) => {
                artifacts.push(read_artifact(&handle.path)?);
                series.push(dataset.series(i));
                report.push(serde_json::json!({
                    "dataset": outcome.dataset,
                    "artifact": handle.path.display().to_string(),
                }));
            }
            Err(e) => {
                failed += 1;
                eprintln!("dataset '{}' failed: {e}", outcome.dataset);
                report.push(serde_json::json!({
                    "dataset": outcome.dataset,
                    "error": e.to_string(),
                }));
            }
        }
    }

    let mut comparison_path = None;
    if !artifacts.is_empty() {
        let path = cfg.out_dir.join(&cfg.comparison);
        let comparison = comparison_artifact(&artifacts, &series, &cfg.legend_title)?;
        write_comparison(&path, &comparison)?;
        comparison_path = Some(path.display().to_string());
    }

    write_json(
        None,
        serde_json::json!({ "datasets": report, "comparison": comparison_path }),
    )?;

    if failed > 0 {
        anyhow::bail!("{failed} of {} datasets failed", jobs.len());
    }
    Ok(())
}

fn write_json(output: Option<&Path>, value: serde_json::Value) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&value)?)?;
    } else {
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}
