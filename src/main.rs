use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use fleet_reconciler::config::{self, ReconcilerConfig};
use fleet_reconciler::paths::GamePaths;
use fleet_reconciler::watcher::ReportWatcher;
use fleet_reconciler::{Pipeline, ProcessOutcome};

#[derive(Parser)]
#[command(name = "fleet-reconciler")]
#[command(about = "Carry Nebulous battle damage and ammunition use back into campaign fleets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the skirmish reports directory and reconcile each new report
    Watch {
        /// TOML config file (embedded defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Reconcile a single battle report
    Process {
        /// Path to the battle report XML
        report: PathBuf,

        /// Template directory (overrides the detected one)
        #[arg(long)]
        templates: Option<PathBuf>,

        /// Output directory (overrides the detected one)
        #[arg(long)]
        output: Option<PathBuf>,

        /// TOML config file (embedded defaults when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Print the outcome as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ReconcilerConfig> {
    let config = config::load_or_default(path.map(|p| p.as_path()))
        .context("failed to load configuration")?;
    fleet_reconciler::init_tracing(&config.log_level);
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.cmd {
        Commands::Watch { config } => {
            let config = load_config(config.as_ref())?;
            let paths = GamePaths::resolve(&config.paths).context("failed to resolve game directories")?;
            paths.ensure_output_dir()?;

            let pipeline = Pipeline::from_paths(&paths, config.matching.policy);
            let (tx, rx) = mpsc::channel();
            let watcher = ReportWatcher::start(&paths.reports_dir, config.watch.settle_delay(), tx)
                .context("failed to start report watcher")?;

            info!(
                "Reconciling reports from {:?} against {:?} into {:?}",
                watcher.dir(),
                pipeline.templates_dir(),
                pipeline.output_dir()
            );
            pipeline.consume(rx);
        }

        Commands::Process {
            report,
            templates,
            output,
            config,
            json,
        } => {
            let mut config = load_config(config.as_ref())?;
            if templates.is_some() {
                config.paths.templates_dir = templates;
            }
            if output.is_some() {
                config.paths.output_dir = output;
            }
            if config.paths.reports_dir.is_none() {
                config.paths.reports_dir = report.parent().map(|p| p.to_path_buf());
            }

            let paths = GamePaths::resolve(&config.paths).context("failed to resolve game directories")?;
            let pipeline = Pipeline::from_paths(&paths, config.matching.policy);
            let outcome = pipeline
                .process_report(&report)
                .with_context(|| format!("failed to reconcile {}", report.display()))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                match outcome {
                    ProcessOutcome::Written { output, .. } => println!("{}", output.display()),
                    ProcessOutcome::NoMatch { survivors } => {
                        let names: Vec<_> = survivors.into_iter().collect();
                        println!("No matching fleet for surviving ships: {}", names.join(", "));
                    }
                }
            }
        }
    }

    Ok(())
}
