//! Host-side config wiring: file location, `${VAR}` expansion and persistence.

use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use std::{fs, path::Path, path::PathBuf};
use weather_tool_core::ToolConfig;

/// Default path to the config file.
pub fn config_file_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("dev", "weather-tool", "weather-tool")
        .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

    Ok(dirs.config_dir().join("config.toml"))
}

/// Load the tool config, resolving `${NAME}` string values from the environment.
pub fn load(path: &Path) -> Result<ToolConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "Config file not found: {}\n\
             Hint: run `weather-tool configure` first.",
            path.display()
        ));
    }

    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut table: toml::Value = toml::from_str(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    expand_env(&mut table, &|name| std::env::var(name).ok())?;

    ToolConfig::from_toml_value(table)
        .with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Save config to disk, creating parent directories as needed.
pub fn save(config: &ToolConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create config directory: {}", parent.display())
        })?;
    }

    let toml = config
        .to_toml_string()
        .context("Failed to serialize configuration to TOML")?;

    fs::write(path, toml)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Replace every string of the exact form `${NAME}` with the variable's value.
///
/// A referenced variable that is unset is an error rather than an empty key.
fn expand_env(value: &mut toml::Value, lookup: &dyn Fn(&str) -> Option<String>) -> Result<()> {
    match value {
        toml::Value::String(s) => {
            if let Some(name) = s
                .strip_prefix("${")
                .and_then(|rest| rest.strip_suffix('}'))
                .map(str::to_string)
            {
                *s = lookup(&name)
                    .ok_or_else(|| anyhow!("Environment variable '{name}' is not set"))?;
            }
        }
        toml::Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                expand_env(v, lookup)?;
            }
        }
        toml::Value::Array(items) => {
            for v in items.iter_mut() {
                expand_env(v, lookup)?;
            }
        }
        _ => {}
    }
    Ok(())
}
