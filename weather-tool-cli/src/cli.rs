use std::{path::PathBuf, process::ExitCode};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Confirm, Password, Select, Text};
use serde_json::{Map, Value};
use tracing::info;
use weather_tool_core::{InvocationRequest, ToolConfig, UnitsSystem, WeatherTool, schema};

use crate::config;

const DEFAULT_BASE_URL: &str = "https://weather.googleapis.com/v1";

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-tool", version, about = "Weather tool host")]
pub struct Cli {
    /// Config file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence when set.
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively write the config file.
    Configure,

    /// Print the tool definitions as JSON.
    Functions,

    /// Invoke a function and print the result envelope as JSON.
    Invoke {
        /// current_conditions, hourly_forecast or daily_forecast.
        function: String,

        /// Argument as KEY=VALUE; VALUE is read as JSON when it parses, else as a string.
        #[arg(long = "arg", value_name = "KEY=VALUE")]
        args: Vec<String>,

        /// All arguments as one JSON object; `--arg` values override it.
        #[arg(long)]
        json: Option<String>,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        let path = match self.config {
            Some(path) => path,
            None => config::config_file_path()?,
        };

        match self.command {
            Command::Configure => {
                let cfg = prompt_config()?;
                config::save(&cfg, &path)?;
                println!("Configuration written to {}", path.display());
                Ok(ExitCode::SUCCESS)
            }
            Command::Functions => {
                println!("{}", serde_json::to_string_pretty(&schema::definitions())?);
                Ok(ExitCode::SUCCESS)
            }
            Command::Invoke {
                function,
                args,
                json,
            } => {
                let cfg = config::load(&path)?;
                info!("Loaded configuration from {}", path.display());

                let arguments = collect_arguments(json.as_deref(), &args)?;
                let tool = WeatherTool::with_reqwest(cfg).context("Failed to build HTTP client")?;

                match tool
                    .invoke_request(&InvocationRequest::new(function, arguments))
                    .await
                {
                    Ok(result) => {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                        Ok(ExitCode::SUCCESS)
                    }
                    Err(err) => {
                        println!("{}", serde_json::to_string_pretty(&err)?);
                        Ok(ExitCode::FAILURE)
                    }
                }
            }
        }
    }
}

fn collect_arguments(json: Option<&str>, pairs: &[String]) -> anyhow::Result<Map<String, Value>> {
    let mut arguments = match json {
        Some(text) => match serde_json::from_str(text).context("--json is not valid JSON")? {
            Value::Object(map) => map,
            _ => return Err(anyhow!("--json must be a JSON object")),
        },
        None => Map::new(),
    };

    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Invalid --arg '{pair}', expected KEY=VALUE"))?;
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        arguments.insert(key.trim().to_string(), value);
    }

    Ok(arguments)
}

fn prompt_config() -> anyhow::Result<ToolConfig> {
    let base_url = Text::new("Weather API base URL:")
        .with_default(DEFAULT_BASE_URL)
        .prompt()?;
    let api_key = Password::new("Weather API key:")
        .without_confirmation()
        .prompt()?;
    let units = Select::new("Default unit system:", vec![UnitsSystem::Imperial, UnitsSystem::Metric])
        .prompt()?;
    let language = Text::new("Default language code:")
        .with_default("en")
        .prompt()?;
    let geocoding_enabled = Confirm::new("Resolve addresses via geocoding?")
        .with_default(true)
        .prompt()?;

    let mut cfg = ToolConfig::new(api_key, base_url)
        .with_units_system(units)
        .with_language(language)
        .with_geocoding_enabled(geocoding_enabled);

    if geocoding_enabled {
        let key = Password::new("Geocoding API key (leave empty to skip):")
            .without_confirmation()
            .prompt()?;
        if !key.trim().is_empty() {
            cfg = cfg.with_geocoding_api_key(key);
        }
    }

    cfg.validate().context("Configuration is invalid")?;
    Ok(cfg)
}
