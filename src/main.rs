use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use sandbox_mcp::config::Config;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// MCP server for remote development sandboxes
#[derive(Parser, Debug)]
#[command(name = "sandbox-mcp")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config.toml (overrides SANDBOX_MCP_CONFIG and the default location)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Serve the tool catalogue over stdio (default)
    Serve,

    /// Print the tool catalogue as JSON
    Tools,

    /// Configuration helpers
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigCommands {
    /// Print the JSON schema of config.toml
    Schema,

    /// Print the effective configuration (token redacted)
    Show,
}

/// Logs go to stderr; stdout carries the MCP protocol.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut std::io::stdout());
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        print_completions(shell);
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?;
    init_logging(&config.log_level);
    for key in &config.unknown_keys {
        tracing::warn!("Ignoring unknown config key: {key}");
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let server = sandbox_mcp::build_server(&config)?;
            sandbox_mcp::server::serve_stdio(server).await
        }
        Commands::Tools => {
            let server = sandbox_mcp::catalogue_server(&config)?;
            println!("{}", serde_json::to_string_pretty(&server.catalogue())?);
            Ok(())
        }
        Commands::Config { config_command } => match config_command {
            ConfigCommands::Schema => {
                let schema = schemars::schema_for!(Config);
                println!("{}", serde_json::to_string_pretty(&schema)?);
                Ok(())
            }
            ConfigCommands::Show => {
                let mut shown = config.clone();
                if shown.control_plane.api_token.is_some() {
                    shown.control_plane.api_token = Some("<redacted>".to_string());
                }
                let rendered =
                    toml::to_string_pretty(&shown).context("Failed to render configuration")?;
                print!("{rendered}");
                Ok(())
            }
        },
        Commands::Completions { .. } => Ok(()),
    }
}
