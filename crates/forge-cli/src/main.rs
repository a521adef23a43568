//! Forge CLI - agent-tooling package manager
//!
//! A thin client over the `forge-*` crates: every subcommand resolves the
//! Forge home directory, then delegates to installer/resolver/registry/
//! config/agents/session operations and renders the result.

use anyhow::Result;
use clap::{Parser, Subcommand};
use forge_core::ForgePaths;

mod commands;
mod output;
mod theme;

use commands::{agents, config, doctor, install, registry, sessions};
use output::OutputFormat;

/// Forge - agent-tooling package manager
#[derive(Parser)]
#[command(name = "forge")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit machine-readable JSON instead of formatted text
    #[arg(long, global = true)]
    json: bool,

    /// Override the Forge home directory (equivalent to `FORGE_HOME`)
    #[arg(long, global = true)]
    home: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install a package from the registry, or from a local directory
    Install {
        /// Fully qualified package id (`stack:name`) or bare name
        id: Option<String>,
        /// Install from a local directory instead of the registry
        #[arg(long)]
        local: Option<String>,
        /// Reinstall even if already present
        #[arg(long)]
        force: bool,
    },
    /// Remove an installed package
    Uninstall {
        /// Fully qualified package id or bare name
        id: String,
    },
    /// Reinstall one package at its latest version
    Update {
        /// Fully qualified package id or bare name
        id: String,
    },
    /// Reinstall every installed package
    UpdateAll,
    /// List installed packages
    List,
    /// Search the registry index
    Search {
        /// Free-text query
        query: String,
        /// Restrict to one package kind (stack|prompt|runtime|binary|agent)
        #[arg(short, long)]
        kind: Option<String>,
    },
    /// Refresh the MCP tool index for every configured stack
    Index,
    /// Manage third-party agent-client MCP registrations
    Agents {
        #[command(subcommand)]
        command: AgentCommands,
    },
    /// Manage the imported session history database
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// View and validate the central configuration document
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run system health checks
    Doctor,
}

#[derive(Subcommand)]
enum AgentCommands {
    /// Write a stack's MCP entry into every installed agent client
    Register {
        /// Fully qualified stack id
        stack_id: String,
        /// Restrict to specific agent ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        agents: Option<Vec<String>>,
    },
    /// Remove a stack's MCP entry from every installed agent client
    Unregister {
        /// Fully qualified stack id
        stack_id: String,
        /// Restrict to specific agent ids (comma-separated)
        #[arg(long, value_delimiter = ',')]
        agents: Option<Vec<String>>,
    },
    /// Show which agent clients currently carry a stack's MCP entry
    Status {
        /// Fully qualified stack id (omit to list installed agent clients)
        stack_id: Option<String>,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// Import transcripts from a provider's on-disk conversation directory
    Import {
        /// Provider whose transcript format to parse (claude|codex|gemini)
        provider: String,
        /// Directory to scan
        path: String,
        /// Re-import sessions already present in the database
        #[arg(long)]
        no_skip_existing: bool,
        /// Import sessions with zero turns
        #[arg(long)]
        no_skip_dead: bool,
    },
    /// Full-text search over imported turns
    Search {
        /// Free-text query
        query: String,
    },
    /// Show aggregate session/turn/cost statistics
    Stats,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved central configuration document
    Show,
    /// Validate the configuration document and report unmet secrets
    Validate,
    /// Show the well-known paths Forge resolves under the home directory
    Paths,
}

fn resolve_paths(home_override: Option<&str>) -> Result<ForgePaths> {
    if let Some(home) = home_override {
        return Ok(ForgePaths::from_root(home));
    }
    Ok(ForgePaths::resolve()?)
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let paths = resolve_paths(cli.home.as_deref())?;
    paths.ensure_directories()?;
    let format = OutputFormat::from_flag(cli.json);

    match cli.command {
        Commands::Install { id, local, force } => {
            let id = id.unwrap_or_default();
            if id.is_empty() && local.is_none() {
                anyhow::bail!("provide a package id or --local <path>");
            }
            install::run_install(&id, local.as_deref(), force, &paths, format).await
        }
        Commands::Uninstall { id } => install::run_uninstall(&id, &paths, format),
        Commands::Update { id } => install::run_update(&id, &paths, format).await,
        Commands::UpdateAll => install::run_update_all(&paths, format).await,
        Commands::List => install::run_list(&paths, format),
        Commands::Search { query, kind } => registry::run_search(&query, kind.as_deref(), &paths, format).await,
        Commands::Index => registry::run_index(&paths, format).await,
        Commands::Agents { command } => match command {
            AgentCommands::Register { stack_id, agents: target } => {
                agents::run_register(&stack_id, target.as_deref(), &paths, format)
            }
            AgentCommands::Unregister { stack_id, agents: target } => {
                agents::run_unregister(&stack_id, target.as_deref(), format)
            }
            AgentCommands::Status { stack_id } => agents::run_status(stack_id.as_deref(), format),
        },
        Commands::Sessions { command } => match command {
            SessionCommands::Import {
                provider,
                path,
                no_skip_existing,
                no_skip_dead,
            } => sessions::run_import(&provider, &path, !no_skip_existing, !no_skip_dead, &paths, format),
            SessionCommands::Search { query } => sessions::run_search(&query, &paths, format),
            SessionCommands::Stats => sessions::run_stats(&paths, format),
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => config::run_show(&paths, format),
            ConfigCommands::Validate => config::run_validate(&paths),
            ConfigCommands::Paths => {
                config::run_paths(&paths);
                Ok(())
            }
        },
        Commands::Doctor => doctor::run_doctor(&paths),
    }
}
