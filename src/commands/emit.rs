use colored::*;
use eyre::{Context, Result};
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;

use lineage_client::{ClientOptions, LineageClient, RunEvent};

pub struct EmitArgs<'a> {
    pub file: Option<&'a Path>,
    pub url: Option<&'a str>,
    pub api_key: Option<String>,
    pub timeout: f64,
    pub insecure: bool,
}

pub fn run(args: EmitArgs<'_>, config_path: Option<&Path>) -> Result<()> {
    let input = read_input(args.file)?;
    let value: serde_json::Value = serde_json::from_str(&input).context("Event is not valid JSON")?;
    let event = RunEvent::from_value(&value).context("Input is not a run event")?;

    let mut builder = LineageClient::builder();
    if let Some(path) = config_path {
        builder = builder.config_file(path);
    }
    if let Some(url) = args.url {
        let options = ClientOptions {
            timeout: Duration::try_from_secs_f64(args.timeout).context("Invalid --timeout")?,
            verify: !args.insecure,
            api_key: args.api_key,
            adapter: None,
        };
        builder = builder.url(url).options(options);
    }
    let client = builder.build().context("Failed to build lineage client")?;

    client.emit(&event).context("Failed to emit event")?;

    if client.filter_event(&event).is_none() {
        println!("{} {} {}", "-".yellow(), event.format_display(), "(filtered)".dimmed());
    } else {
        println!(
            "{} {} → {}",
            "✓".green(),
            event.format_display(),
            client.transport().url().unwrap_or(client.transport().kind()).cyan()
        );
    }

    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => {
            fs::read_to_string(path).context(format!("Failed to read {}", path.display()))
        }
        _ => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read event from stdin")?;
            Ok(input)
        }
    }
}
