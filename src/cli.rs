use clap::{Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format
    Json,
    /// YAML format
    Yaml,
}

impl OutputFormat {
    /// Resolve the effective output format.
    /// If user specified a format, use it.
    /// Otherwise: TTY → Text, non-TTY (pipe) → Json
    pub fn resolve(user_choice: Option<OutputFormat>) -> OutputFormat {
        match user_choice {
            Some(fmt) => fmt,
            None => {
                if std::io::stdout().is_terminal() {
                    OutputFormat::Text
                } else {
                    OutputFormat::Json
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl LogLevel {
    pub fn as_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Off => log::LevelFilter::Off,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "lineage",
    about = "Emit lineage run events to a configured transport",
    version = env!("CARGO_PKG_VERSION"),
    after_help = "Config is read from --config, $OPENLINEAGE_CONFIG, ./openlineage.yml or ~/.openlineage/openlineage.yml"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to openlineage.yml config file")]
    pub config: Option<PathBuf>,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Emit a run event read from a JSON file or stdin
    Emit {
        /// Event file ("-" or omitted reads stdin)
        file: Option<PathBuf>,

        /// Send over HTTP to this base URL instead of the configured transport
        #[arg(long)]
        url: Option<String>,

        /// API key sent as a bearer token (with --url)
        #[arg(long, env = "OPENLINEAGE_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Request timeout in seconds (with --url)
        #[arg(long, default_value_t = 5.0)]
        timeout: f64,

        /// Skip TLS certificate verification (with --url)
        #[arg(long)]
        insecure: bool,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the resolved configuration
    Show {
        /// Output format (default: text for TTY, json for pipes)
        #[arg(long, short = 'o', value_enum)]
        format: Option<OutputFormat>,
    },
}
