use clap::{Parser, ValueEnum};

#[derive(Parser, Debug, Clone, ValueEnum)]
pub enum LoggingFormat {
    Standard,
    Json,
}

/// Global arguments used by all subcommands
#[derive(Debug, Parser)]
#[command(name = "sweep")]
pub struct GlobalArgs {
    /// Solana RPC endpoint URL (overrides the config file)
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Path to sweep configuration file (TOML format)
    #[arg(long, default_value = "sweep.toml")]
    pub config: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LoggingFormat::Standard)]
    pub logging_format: LoggingFormat,

    /// Print command output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}
