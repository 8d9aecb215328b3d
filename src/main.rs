use clap::Parser;
use eyre::{Context, Result};
use log::info;

mod cli;
mod commands;

use cli::{Cli, Commands, LogLevel};
use commands::emit::EmitArgs;

fn setup_logging(log_level: LogLevel) {
    // RUST_LOG env var takes precedence, otherwise use --log-level
    let mut builder = env_logger::Builder::new();

    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_default_env();
    } else {
        builder.filter_level(log_level.as_filter());
    }

    builder.target(env_logger::Target::Stderr).init();

    info!(
        "Log level: {} (from {})",
        log_level.as_filter(),
        if std::env::var("RUST_LOG").is_ok() { "RUST_LOG env" } else { "--log-level" }
    );
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Emit {
            file,
            url,
            api_key,
            timeout,
            insecure,
        } => commands::emit::run(
            EmitArgs {
                file: file.as_deref(),
                url: url.as_deref(),
                api_key,
                timeout,
                insecure,
            },
            config_path,
        ),
        Commands::Config { action } => commands::config::run(action, config_path),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.log_level);

    info!("Starting lineage with config from: {:?}", cli.config);

    run(cli).context("Command failed")?;

    Ok(())
}
