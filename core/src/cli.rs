use crate::config::Config;
use crate::engine::{Runtime, RuntimeEvent, RuntimeOptions};
use crate::project::{self, Project};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "blockvm")]
#[command(about = "blockvm - run block-script projects", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Press the green flag and run a project
    Run {
        /// Project JSON file
        project: PathBuf,

        /// Stop after this many frames
        #[arg(long)]
        ticks: Option<u64>,

        /// Turbo mode: ignore redraw requests within a frame
        #[arg(long)]
        turbo: bool,

        /// Compatibility mode: 30 frames per second
        #[arg(long)]
        compat: bool,
    },

    /// List the scripts of a project by target
    Scripts {
        /// Project JSON file
        project: PathBuf,

        /// Only this target
        #[arg(short = 't', long = "target")]
        target: Option<String>,
    },

    /// Print the effective configuration
    Config,
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let config = Config::builder()
        .config_path(cli.config.map(PathBuf::from))
        .build()
        .context("Failed to load configuration")?;

    init_tracing(&config);

    match cli.command {
        Commands::Run {
            project,
            ticks,
            turbo,
            compat,
        } => {
            let mut options = RuntimeOptions::from(&config);
            options.turbo_mode |= turbo;
            options.compatibility_mode |= compat;
            run_project(&project, options, ticks).await?;
        }

        Commands::Scripts { project, target } => {
            let mut runtime = Runtime::new();
            load_project(&project)?
                .install(&mut runtime)
                .context("Failed to install project")?;

            let filter = match target {
                Some(name) => Some(project::target_by_name(&runtime, &name)?),
                None => None,
            };

            for target in runtime.targets() {
                if filter.map_or(false, |id| id != target.id) {
                    continue;
                }
                println!("{}{}", target.name, if target.is_stage() { " (stage)" } else { "" });
                let Some(blocks) = runtime.blocks_of(target.id) else {
                    continue;
                };
                for script in blocks.get_scripts() {
                    let opcode = blocks
                        .get_opcode(script)
                        .map(|op| op.to_string())
                        .unwrap_or_default();
                    println!("  {} | {}", script, opcode);
                }
            }
        }

        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    // a subscriber may already be installed by an embedding host
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_project(path: &Path) -> Result<Project> {
    Project::load(path).with_context(|| format!("Failed to load project {}", path.display()))
}

/// Step the runtime once per frame until no threads are left
async fn run_project(path: &Path, options: RuntimeOptions, ticks: Option<u64>) -> Result<()> {
    let mut runtime = Runtime::with_options(options);
    load_project(path)?
        .install(&mut runtime)
        .context("Failed to install project")?;

    runtime.green_flag();
    info!(threads = runtime.threads().len(), "green flag");

    let mut interval = tokio::time::interval(runtime.current_step_time());
    let mut frames = 0u64;
    loop {
        interval.tick().await;
        runtime.step();
        frames += 1;

        for event in runtime.drain_events() {
            match event {
                RuntimeEvent::VisualReport { block_id, value } => {
                    println!("{} => {}", block_id, value);
                }
                RuntimeEvent::ProjectRunStart => info!("project started"),
                RuntimeEvent::ProjectRunStop => info!("project stopped"),
                other => debug!(?other, "runtime event"),
            }
        }

        let finished = runtime.threads().is_empty();
        if finished || ticks.map_or(false, |limit| frames >= limit) {
            break;
        }
    }

    info!(frames, threads = runtime.threads().len(), "run finished");
    Ok(())
}
