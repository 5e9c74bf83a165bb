//! Dooray CLI - Command-line interface for dooray-tools.

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use dooray_api::DoorayHttpClient;
use dooray_core::Config;
use dooray_mcp::protocol::ServerInfo;
use dooray_mcp::{HttpConfig, McpServer, ToolRegistry, TransportKind};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dooray-mcp-server")]
#[command(author, version, about = "Dooray MCP server and tools", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server
    Serve {
        /// Transport: stdio, streamable-http, http, or sse
        #[arg(short, long, default_value = "stdio")]
        transport: String,

        /// Host to bind to (HTTP transports)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (HTTP transports)
        #[arg(short, long)]
        port: Option<u16>,

        /// MCP endpoint path (HTTP transports)
        #[arg(long)]
        path: Option<String>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Set Dooray API credentials
    Set {
        /// Dooray API base URL
        #[arg(long)]
        base_url: Option<String>,

        /// Dooray API key
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging goes to stderr so stdout stays clean for the stdio transport.
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Some(Commands::Serve {
            transport,
            host,
            port,
            path,
        }) => serve(&transport, host, port, path).await,
        Some(Commands::Config { command }) => match command {
            ConfigCommands::Set { base_url, api_key } => config_set(base_url, api_key),
            ConfigCommands::Show => config_show(),
        },
        None => {
            println!("Dooray MCP server and tools");
            println!("Run with --help for usage information");
            Ok(())
        }
    }
}

async fn serve(
    transport: &str,
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let server = build_server(&config)?;

    if transport == "stdio" {
        server.run_stdio().await?;
        return Ok(());
    }

    let kind: TransportKind = transport.parse().map_err(anyhow::Error::msg)?;
    let http = HttpConfig {
        host: host.unwrap_or(config.server.host),
        port: port.unwrap_or(config.server.port),
        path: path.unwrap_or(config.server.path),
        kind,
        ..HttpConfig::default()
    };
    server.serve_http(http).await?;
    Ok(())
}

fn build_server(config: &Config) -> anyhow::Result<McpServer> {
    let base_url = config
        .dooray
        .base_url
        .clone()
        .context("Dooray base URL not configured (set DOORAY_BASE_URL or run `config set`)")?;
    let api_key = config
        .dooray
        .api_key
        .clone()
        .context("Dooray API key not configured (set DOORAY_API_KEY or run `config set`)")?;

    let client = Arc::new(DoorayHttpClient::new(base_url, api_key));
    let mut registry = ToolRegistry::new();
    dooray_mcp::tools::register_api_tools(&mut registry, client)?;

    Ok(McpServer::new(
        Arc::new(registry),
        ServerInfo {
            name: "dooray-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    ))
}

fn config_set(base_url: Option<String>, api_key: Option<String>) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(url) = base_url {
        config.dooray.base_url = Some(url);
    }
    if api_key.is_some() {
        config.dooray.api_key = api_key;
        tracing::info!("API key provided (hidden)");
    }
    config.save()?;
    println!("Configuration saved to {}", Config::config_path()?.display());
    Ok(())
}

fn config_show() -> anyhow::Result<()> {
    let config = Config::load()?;
    println!(
        "base_url: {}",
        config.dooray.base_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "api_key: {}",
        if config.dooray.api_key.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!(
        "server: {}:{}{}",
        config.server.host, config.server.port, config.server.path
    );
    Ok(())
}
