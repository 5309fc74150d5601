mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{progress::ProgressSubcommand, taxonomy::TaxonomySubcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "onboard",
    about = "Role-aware onboarding engine — manage the role taxonomy and walk users through their flows",
    version,
    propagate_version = true
)]
struct Cli {
    /// Workspace root (default: auto-detect from .onboard/ or .git/)
    #[arg(long, global = true, env = "ONBOARD_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize an onboarding workspace in the current project
    Init {
        /// Start from an empty taxonomy instead of the bundled starter
        #[arg(long)]
        bare: bool,
    },

    /// Validate the workspace config and taxonomy
    Check,

    /// Inspect roles, categories, levels, and flows
    Taxonomy {
        #[command(subcommand)]
        subcommand: TaxonomySubcommand,
    },

    /// Manage per-user onboarding progress
    Progress {
        #[command(subcommand)]
        subcommand: ProgressSubcommand,
    },

    /// Serve the onboarding HTTP API
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "7878")]
        port: u16,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root_path = cli.root.as_deref();
    let root = root::resolve_root(root_path);

    let result = match cli.command {
        Commands::Init { bare } => cmd::init::run(&root, bare),
        Commands::Check => cmd::check::run(&root, cli.json),
        Commands::Taxonomy { subcommand } => cmd::taxonomy::run(&root, subcommand, cli.json),
        Commands::Progress { subcommand } => cmd::progress::run(&root, subcommand, cli.json),
        Commands::Serve { port } => cmd::serve::run(&root, port),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
