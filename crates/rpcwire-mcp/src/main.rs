//! rpcwire MCP server - entry point.

use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use rpcwire_mcp::config::ServeArgs;
use rpcwire_mcp::tools::BuiltinTools;
use rpcwire_mcp::transport::build_driver;
use rpcwire_mcp::types::InitOptions;

#[derive(Parser)]
#[command(
    name = "rpcwire-mcp",
    about = "JSON-RPC 2.0 / MCP server over stdio or multi-worker streaming HTTP",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error). RUST_LOG takes precedence.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the MCP server (default).
    Serve(ServeArgs),

    /// Print server capabilities, methods and tools as JSON.
    Info,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   rpcwire-mcp completions bash > ~/.local/share/bash-completion/completions/rpcwire-mcp
    ///   rpcwire-mcp completions zsh > ~/.zfunc/_rpcwire-mcp
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

/// `serve` with nothing on the command line: environment and defaults only.
#[derive(Parser)]
#[command(name = "rpcwire-mcp")]
struct DefaultServe {
    #[command(flatten)]
    args: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let command = match cli.command {
        Some(command) => command,
        None => Commands::Serve(DefaultServe::try_parse_from(["rpcwire-mcp"])?.args),
    };

    match command {
        Commands::Serve(args) => {
            let config = args.into_config()?;
            let registry = Arc::new(rpcwire_mcp::builtin_registry(&config.init));
            let driver = build_driver(&config)?;

            tracing::info!(
                "rpcwire MCP server v{} ({} transport, {} methods)",
                env!("CARGO_PKG_VERSION"),
                driver.name(),
                registry.len()
            );
            if config.http.token.is_some() && config.transport == rpcwire_mcp::TransportKind::Http {
                tracing::info!("Auth: bearer token required");
            }

            driver.run(registry, config.init).await?;
        }

        Commands::Info => {
            let init = InitOptions::default();
            let result = init.initialize_result();
            let registry = rpcwire_mcp::builtin_registry(&init);
            let tools = BuiltinTools::definitions();
            let info = serde_json::json!({
                "server": result.server_info,
                "protocol_version": result.protocol_version,
                "capabilities": result.capabilities,
                "methods": registry.methods(),
                "tools": tools.iter().map(|t| &t.name).collect::<Vec<_>>(),
                "tool_count": tools.len(),
            });
            println!("{}", serde_json::to_string_pretty(&info)?);
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "rpcwire-mcp", &mut std::io::stdout());
        }
    }

    Ok(())
}
