//! `hicann` — command-line interface for HICANN single-neuron weight sweeps.
//!
//! ```text
//! USAGE:
//!   hicann sweep [options]       Map, program, sweep and archive
//!   hicann inspect <archive>     Summarize a results archive
//!   hicann defaults              Print the effective default configuration
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hicann_driver::config::WAFER_ENV;
use hicann_driver::{
    run_single_neuron_sweep, ExperimentConfig, MappingResults, PlacementMapper, SoftwareBackend,
    SweepPoint, TextFileSink,
};
use tracing_subscriber::EnvFilter;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "warn,hicann=debug,hicann_driver=info";

#[derive(Parser)]
#[command(name = "hicann", about = "HICANN single-neuron weight sweep", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Map the single-neuron network, program gmax and sweep the digital weight.
    Sweep(SweepArgs),
    /// Print a summary of a results archive.
    Inspect {
        /// Archive written by `hicann sweep`.
        archive: PathBuf,
        /// Also list every configured synapse of each HICANN.
        #[arg(long)]
        synapses: bool,
    },
    /// Print the effective default configuration as JSON.
    Defaults,
}

#[derive(clap::Args)]
struct SweepArgs {
    /// JSON configuration file; flags override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Wafer id.
    #[arg(long, env = WAFER_ENV)]
    wafer: Option<u32>,
    /// HICANN the observed neuron is placed on.
    #[arg(long)]
    hicann: Option<u16>,
    /// Sweep points, e.g. `disabled,0,5,10,15`.
    #[arg(long, value_delimiter = ',')]
    weights: Option<Vec<String>>,
    /// V_gmax floating-gate value (0..=1023).
    #[arg(long)]
    gmax: Option<u16>,
    /// Per-row gmax divisor (2..=30).
    #[arg(long)]
    gmax_div: Option<u8>,
    /// Emulated time per run in ms.
    #[arg(long)]
    duration: Option<f64>,
    /// Directory for the per-point text files.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Archive path.
    #[arg(long)]
    results: Option<PathBuf>,
    /// Fail instead of replacing an existing archive.
    #[arg(long)]
    no_overwrite: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Cmd::Sweep(args) => cmd_sweep(args)?,
        Cmd::Inspect { archive, synapses } => cmd_inspect(&archive, synapses)?,
        Cmd::Defaults => cmd_defaults()?,
    }

    Ok(())
}

fn build_config(args: SweepArgs) -> Result<ExperimentConfig> {
    let mut config = match &args.config {
        Some(path) => ExperimentConfig::from_file(path)?,
        None => ExperimentConfig::default(),
    };

    if let Some(wafer) = args.wafer {
        config.wafer = wafer;
    }
    if let Some(hicann) = args.hicann {
        config.hicann = hicann;
    }
    if let Some(weights) = args.weights {
        config.weights = weights
            .iter()
            .map(|w| {
                w.parse::<SweepPoint>().map(|point| match point {
                    SweepPoint::Weight(weight) => Some(weight.value()),
                    SweepPoint::Disabled => None,
                })
            })
            .collect::<hicann_driver::Result<_>>()?;
    }
    if let Some(gmax) = args.gmax {
        config.gmax = gmax;
    }
    if let Some(gmax_div) = args.gmax_div {
        config.gmax_div = gmax_div;
    }
    if let Some(duration) = args.duration {
        config.duration_ms = duration;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(results) = args.results {
        config.results_path = results;
    }
    if args.no_overwrite {
        config.overwrite = false;
    }

    config.validate()?;
    Ok(config)
}

fn cmd_sweep(args: SweepArgs) -> Result<()> {
    let config = build_config(args)?;
    tracing::debug!("Effective configuration: {config:?}");
    let mut mapper = PlacementMapper::new(config.hicann()?);
    let mut sink = TextFileSink::create(&config.output_dir)?;

    let outcome = run_single_neuron_sweep(
        &config,
        Box::new(SoftwareBackend::new()),
        &mut mapper,
        &mut sink,
    )
    .with_context(|| format!("weight sweep on wafer {} failed", config.wafer))?;

    println!("Swept weights : {}", outcome.report.labels.join(", "));
    println!("Traces        : {}", sink.dir().display());
    println!("Archive       : {}", outcome.results_path.display());
    println!(
        "Synapses      : {} mapped, {} active",
        outcome.summary.mapped_synapses, outcome.summary.active_synapses
    );
    Ok(())
}

fn cmd_inspect(archive: &std::path::Path, list_synapses: bool) -> Result<()> {
    let results = MappingResults::load(archive)?;
    let summary = results.summary();

    println!("Archive      : {}", archive.display());
    println!("Wafer        : {}", summary.wafer);
    println!("HICANNs      : {}", summary.hicanns);
    println!("Projections  : {}", summary.projections);
    println!(
        "Synapses     : {} mapped, {} active, {} disabled",
        summary.mapped_synapses, summary.active_synapses, summary.disabled_synapses
    );
    for projection in results.mapping.projections() {
        for item in results.mapping.find(projection)? {
            println!(
                "  {projection} [{} → {}] {} : {}",
                item.source_index,
                item.target_index,
                item.synapse,
                results.wafer.synapse(item.synapse)?
            );
        }
    }

    if list_synapses {
        for (hicann, config) in results.wafer.hicanns() {
            println!("{hicann}:");
            for (synapse, synapse_config) in config.configured_synapses() {
                println!("  {synapse} : {synapse_config}");
            }
        }
    }
    Ok(())
}

fn cmd_defaults() -> Result<()> {
    let config = ExperimentConfig::from_env()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
