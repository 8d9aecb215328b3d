use colored::*;
use eyre::Result;
use std::path::Path;

use lineage_client::{Config, SearchPaths};

use crate::cli::{ConfigAction, OutputFormat};

pub fn run(action: ConfigAction, config_path: Option<&Path>) -> Result<()> {
    let (config, source) = Config::load_with(&SearchPaths::from_process(config_path));

    match action {
        ConfigAction::Show { format } => show(OutputFormat::resolve(format), &config, source.as_deref()),
    }
}

fn show(format: OutputFormat, config: &Config, source: Option<&Path>) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        OutputFormat::Yaml => {
            println!("{}", serde_yaml::to_string(config)?);
        }
        OutputFormat::Text => {
            println!("{}", "Lineage Configuration".bold());
            match source {
                Some(path) => println!("  source: {}", path.display()),
                None => println!("  source: {}", "defaults (no config file)".dimmed()),
            }
            println!();

            println!("{}:", "transport".cyan());
            match &config.transport {
                Some(transport) => {
                    println!("  type: {}", transport.kind.as_deref().unwrap_or("<missing>"));
                    for (key, value) in &transport.settings {
                        let key = key.as_str().unwrap_or("?");
                        // Keep secrets out of terminal scrollback
                        if key == "api_key" {
                            println!("  {}: ***", key);
                        } else {
                            println!("  {}: {}", key, serde_yaml::to_string(value)?.trim_end());
                        }
                    }
                }
                None => println!("  type: console {}", "(default)".dimmed()),
            }
            println!();

            println!("{}:", "filters".cyan());
            if config.filters.is_empty() {
                println!("  {}", "none".dimmed());
            }
            for filter in &config.filters {
                let kind = filter.kind.as_deref().unwrap_or("<untyped>");
                let pattern = filter.match_.as_deref().or(filter.regex.as_deref()).unwrap_or("");
                println!("  - {} {}", kind, pattern);
            }
        }
    }

    Ok(())
}
