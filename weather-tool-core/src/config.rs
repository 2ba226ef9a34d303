use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, model::UnitsSystem};

pub const DEFAULT_GEOCODING_BASE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Immutable configuration for one tool instance.
///
/// Example TOML:
/// ```toml
/// api_key = "..."
/// base_url = "https://weather.googleapis.com/v1"
/// unitsSystem = "metric"
/// language = "de"
/// geocoding_api_key = "..."
/// ```
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolConfig {
    /// Weather provider API key.
    pub api_key: String,

    /// Root of the weather API, e.g. `https://weather.googleapis.com/v1`.
    pub base_url: String,

    /// Key for the geocoding provider. Address lookups are unavailable without it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoding_api_key: Option<String>,

    #[serde(rename = "unitsSystem", default)]
    pub units_system: UnitsSystem,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_true")]
    pub geocoding_enabled: bool,

    #[serde(default = "default_geocoding_base_url")]
    pub geocoding_base_url: String,

    /// Per-request timeout applied by the HTTP transport.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

fn default_true() -> bool {
    true
}

fn default_geocoding_base_url() -> String {
    DEFAULT_GEOCODING_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// Keys are redacted so the config can be logged safely.
impl std::fmt::Debug for ToolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolConfig")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field(
                "geocoding_api_key",
                &self.geocoding_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("units_system", &self.units_system)
            .field("language", &self.language)
            .field("geocoding_enabled", &self.geocoding_enabled)
            .field("geocoding_base_url", &self.geocoding_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl ToolConfig {
    /// Create a config with the two required options and defaults for the rest.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            geocoding_api_key: None,
            units_system: UnitsSystem::default(),
            language: default_language(),
            geocoding_enabled: true,
            geocoding_base_url: default_geocoding_base_url(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_geocoding_api_key(mut self, key: impl Into<String>) -> Self {
        self.geocoding_api_key = Some(key.into());
        self
    }

    pub fn with_units_system(mut self, units: UnitsSystem) -> Self {
        self.units_system = units;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_geocoding_enabled(mut self, enabled: bool) -> Self {
        self.geocoding_enabled = enabled;
        self
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: ToolConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validated()
    }

    /// Parse and validate an already-loaded TOML table.
    pub fn from_toml_value(value: toml::Value) -> Result<Self, ConfigError> {
        let cfg: ToolConfig = value
            .try_into()
            .map_err(|e: toml::de::Error| ConfigError::Parse(e.to_string()))?;
        cfg.validated()
    }

    /// Parse and validate a JSON object, as handed over by hosts that keep
    /// tool settings in JSON.
    pub fn from_json_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let cfg: ToolConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validated()
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        check_url("base_url", &self.base_url)?;
        check_url("geocoding_base_url", &self.geocoding_base_url)?;
        if self.language.trim().is_empty() {
            return Err(ConfigError::EmptyLanguage);
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    fn validated(self) -> Result<Self, ConfigError> {
        self.validate()?;
        Ok(self)
    }

    /// Geocoding key, if address lookups are both enabled and possible.
    pub fn geocoding_key(&self) -> Option<&str> {
        if !self.geocoding_enabled {
            return None;
        }
        self.geocoding_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }
}

fn check_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("https://") || value.starts_with("http://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        })
    }
}
