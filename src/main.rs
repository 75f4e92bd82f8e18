#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use chatbridge::{gateway, Config};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// `chatbridge` - chat gateway for a local Ollama server.
#[derive(Parser, Debug)]
#[command(name = "chatbridge")]
#[command(version)]
#[command(about = "HTTP/WebSocket chat gateway for a local LLM server.", long_about = None)]
struct Cli {
    /// Directory holding config.toml (default: ~/.chatbridge)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the gateway server (HTTP + WebSocket)
    #[command(long_about = "\
Start the gateway server.

Serves POST /chat, the /ws/chat/{session_id} WebSocket and a GET / \
liveness probe. Bind address defaults to the values in your config \
file (gateway.host / gateway.port), overridable with PORT / HOST.

Examples:
  chatbridge serve                  # use config defaults
  chatbridge serve -p 8080          # listen on port 8080
  chatbridge serve --host 0.0.0.0   # bind to all interfaces
  chatbridge serve -p 0             # random available port")]
    Serve {
        /// Port to listen on (use 0 for random available port); defaults to config gateway.port
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to; defaults to config gateway.host
        #[arg(long)]
        host: Option<String>,
    },

    /// Show the effective configuration summary
    Status,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(dir) = &cli.config_dir {
        if dir.as_os_str().is_empty() {
            bail!("--config-dir cannot be empty");
        }
    }

    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = Config::load_or_init(cli.config_dir.as_deref()).await?;

    match cli.command {
        Commands::Serve { port, host } => {
            let port = port.unwrap_or(config.gateway.port);
            let host = host.unwrap_or_else(|| config.gateway.host.clone());
            if port == 0 {
                info!("Starting chatbridge gateway on {host} (random port)");
            } else {
                info!("Starting chatbridge gateway on {host}:{port}");
            }
            gateway::run_gateway(&host, port, &config).await
        }

        Commands::Status => {
            println!("chatbridge {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Config:    {}", config.config_path.display());
            println!("Gateway:   {}:{}", config.gateway.host, config.gateway.port);
            println!(
                "Backend:   {} ({})",
                config.inference.base_url, config.inference.provider
            );
            println!("Model:     {}", config.inference.model);
            println!(
                "Timeouts:  connect {}s, request {}s",
                config.inference.connect_timeout_secs, config.inference.request_timeout_secs
            );
            if config.chat_log.enabled {
                println!("Chat log:  {}", config.chat_log.resolved_path().display());
            } else {
                println!("Chat log:  disabled");
            }
            Ok(())
        }

        Commands::Config { config_command } => match config_command {
            ConfigCommands::Show => {
                let rendered =
                    toml::to_string_pretty(&config).context("Failed to serialize config")?;
                print!("{rendered}");
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_has_no_flag_conflicts() {
        Cli::command().debug_assert();
    }

    #[test]
    fn serve_parses_port_and_host() {
        let cli = Cli::try_parse_from(["chatbridge", "serve", "-p", "9000", "--host", "0.0.0.0"])
            .expect("serve invocation should parse");
        match cli.command {
            Commands::Serve { port, host } => {
                assert_eq!(port, Some(9000));
                assert_eq!(host.as_deref(), Some("0.0.0.0"));
            }
            other => panic!("expected serve command, got {other:?}"),
        }
    }

    #[test]
    fn config_dir_is_global() {
        let cli = Cli::try_parse_from(["chatbridge", "status", "--config-dir", "/tmp/cb"])
            .expect("global flag should parse after subcommand");
        assert_eq!(cli.config_dir, Some(PathBuf::from("/tmp/cb")));
    }
}
