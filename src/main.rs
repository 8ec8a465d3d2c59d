//! erm-analyzer: Extended Roofline Model analysis of simulated kernels

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use erm_analyzer::hardware::{HardwareConfig, ParameterKind, Precision};
use erm_analyzer::model::export;
use erm_analyzer::resource::Resource;
use erm_analyzer::{analyze, runner, Analysis, Config, RunConfig};

#[derive(Parser)]
#[command(name = "erm-analyzer")]
#[command(about = "Extended Roofline Model analysis of simulated kernels")]
#[command(version)]
struct Cli {
    /// Microarchitecture identifier (selects config<UARCH>.json)
    #[arg(long, global = true)]
    uarch: Option<String>,

    /// Floating-point precision: single or double
    #[arg(long, global = true)]
    precision: Option<Precision>,

    /// Directory holding the hardware descriptors
    #[arg(long, global = true)]
    configs_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the model from an existing simulator report
    Analyze {
        /// Statistics report produced by the instrumented interpreter
        report: PathBuf,

        /// Write the model as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write one file per bound into this directory
        #[arg(long)]
        legacy_dir: Option<PathBuf>,

        /// Emit compute/memory overlap curves
        #[arg(long)]
        overlap: bool,
    },

    /// Compile and profile the configured benchmark, then analyze it
    Run {
        /// Write the model as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Query one hardware parameter
    Param {
        /// Parameter name (e.g. throughput, latency, rs, l1-cache-size)
        parameter: ParameterKind,

        /// Resource for per-unit parameters (e.g. fadd, l1_load)
        resource: Option<Resource>,
    },

    /// Print a sample configuration file
    SampleConfig,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    let mut config = Config::load();
    config.merge(Config {
        uarch: cli.uarch,
        precision: cli.precision,
        configs_dir: cli.configs_dir,
        ..Config::default()
    });

    match cli.command {
        Commands::Analyze {
            report,
            json,
            legacy_dir,
            overlap,
        } => {
            let mut run = config.run_config();
            run.plot.overlap |= overlap;
            let analysis = analyze(&report, &run).with_context(|| format!("analyzing {}", report.display()))?;
            finish(&analysis, &report, json.as_deref(), legacy_dir.as_deref())
        }
        Commands::Run { json } => {
            let run = config.run_config();
            let report = runner::run(&run).context("profiling benchmark")?;
            let analysis = analyze(&report, &run).with_context(|| format!("analyzing {}", report.display()))?;
            let legacy_dir = run.output_dir.clone();
            finish(&analysis, &report, json.as_deref(), Some(&legacy_dir))
        }
        Commands::Param { parameter, resource } => query_parameter(&config.run_config(), parameter, resource),
        Commands::SampleConfig => {
            print!("{}", Config::sample_config());
            if let Some(path) = Config::user_config_path() {
                eprintln!("# User config location: {}", path.display());
            }
            Ok(())
        }
    }
}

fn finish(analysis: &Analysis, report: &Path, json: Option<&Path>, legacy_dir: Option<&Path>) -> anyhow::Result<()> {
    analysis.model.print_summary();

    if let Some(path) = json {
        export::write_json(path, &analysis.model)?;
        println!();
        println!("Model written to {}", path.display());
    }

    if let Some(dir) = legacy_dir {
        let serie = export::serie_of(report);
        let count = export::write_legacy(dir, &serie, &analysis.stats, &analysis.bounds)?;
        println!("{} bound files written to {}", count, dir.display());
    }

    Ok(())
}

fn query_parameter(run: &RunConfig, parameter: ParameterKind, resource: Option<Resource>) -> anyhow::Result<()> {
    let hw = HardwareConfig::load(&run.configs_dir, &run.uarch, run.precision)?;

    let index = match (parameter.is_per_resource(), resource) {
        (true, Some(r)) => r.index(),
        (true, None) => bail!("parameter `{}` needs a resource", parameter),
        (false, _) => 0,
    };

    let value = hw.get(parameter, index)?;
    match resource.filter(|_| parameter.is_per_resource()) {
        Some(r) => println!("{} {} ({}): {}", hw.id(), parameter, r, value),
        None => println!("{} {}: {}", hw.id(), parameter, value),
    }
    Ok(())
}
