//! ACVPS CLI — the gateway's main entry point.
//!
//! Commands:
//! - `serve`      — Start the proxy gateway (and its metrics endpoint)
//! - `config`     — Configuration management
//! - `contract`   — Validate and push tenant policy contracts
//! - `guardrail`  — List and register guardrails against a running gateway
//! - `completions` — Generate shell completion scripts
//! - `version`    — Show detailed version and build info

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};

mod commands;

#[derive(Parser)]
#[command(
    name = "acvps",
    about = "ACVPS — transparent HTTP proxy gateway enforcing tenant policy contracts on LLM traffic.",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway (proxy + management API + metrics)
    Serve {
        /// Override GATEWAY_BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Manage tenant policy contracts
    Contract {
        #[command(subcommand)]
        action: ContractAction,
    },

    /// Manage guardrails on a running gateway
    Guardrail {
        #[command(subcommand)]
        action: GuardrailAction,
    },

    /// Generate shell completion scripts
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show detailed version and build info
    Version,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate the current configuration
    Validate,
    /// Show the resolved configuration
    Show,
}

#[derive(Subcommand)]
enum ContractAction {
    /// Validate a contract JSON file's schema and policy digest
    Validate {
        /// Path to the contract JSON file
        path: String,
    },
    /// Push a contract to a running gateway's management API
    Push {
        /// Path to the contract JSON file
        path: String,
        /// Base URL of the gateway, e.g. http://localhost:8080
        #[arg(long, default_value = "http://localhost:8080")]
        gateway_url: String,
        /// API key to authenticate the push
        #[arg(long, env = "GATEWAY_API_KEY")]
        api_key: Option<String>,
    },
}

#[derive(Subcommand)]
enum GuardrailAction {
    /// List guardrails registered on a running gateway
    List {
        #[arg(long, default_value = "http://localhost:8080")]
        gateway_url: String,
    },
    /// Register a dynamic guardrail config against a running gateway
    Register {
        /// Path to the guardrail config JSON file
        path: String,
        #[arg(long, default_value = "http://localhost:8080")]
        gateway_url: String,
        #[arg(long, env = "GATEWAY_API_KEY")]
        api_key: Option<String>,
    },
}

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { bind } => commands::serve::run(bind).await?,

        Commands::Config { action } => match action {
            ConfigAction::Validate => commands::config_cmd::validate().await?,
            ConfigAction::Show => commands::config_cmd::show().await?,
        },

        Commands::Contract { action } => match action {
            ContractAction::Validate { path } => commands::contract::validate(&path).await?,
            ContractAction::Push { path, gateway_url, api_key } => commands::contract::push(&path, &gateway_url, api_key.as_deref()).await?,
        },

        Commands::Guardrail { action } => match action {
            GuardrailAction::List { gateway_url } => commands::guardrail::list(&gateway_url).await?,
            GuardrailAction::Register { path, gateway_url, api_key } => {
                commands::guardrail::register(&path, &gateway_url, api_key.as_deref()).await?
            }
        },

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "acvps", &mut std::io::stdout());
        }

        Commands::Version => {
            println!("acvps v{}", env!("CARGO_PKG_VERSION"));
            println!("   Arch:  {}", std::env::consts::ARCH);
            println!("   OS:    {}", std::env::consts::OS);
            println!("   Rust:  compiled with edition 2024");
        }
    }

    Ok(())
}
