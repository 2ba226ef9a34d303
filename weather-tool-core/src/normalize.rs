use crate::{
    config::ToolConfig,
    error::ToolError,
    model::{Locale, UnitsSystem},
};

/// Fills units and language from config defaults and canonicalises overrides.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    config: &'a ToolConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a ToolConfig) -> Self {
        Self { config }
    }

    pub fn normalize(
        &self,
        units: Option<&str>,
        language: Option<&str>,
    ) -> Result<Locale, ToolError> {
        let units = match units {
            Some(value) => UnitsSystem::try_from(value)?,
            None => self.config.units_system,
        };

        let language = language
            .and_then(canonical_language)
            .unwrap_or_else(|| self.config.language.clone());

        Ok(Locale { units, language })
    }
}

/// Language codes pass through untouched apart from trimming and `en_US` → `en-US`.
fn canonical_language(code: &str) -> Option<String> {
    let code = code.trim();
    if code.is_empty() {
        None
    } else {
        Some(code.replace('_', "-"))
    }
}
