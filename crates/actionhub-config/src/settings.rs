//! Runtime knobs shared by every integration.

use crate::error::{ConfigError, ConfigResult};
use crate::loader::FileFormat;
use actionhub_core::pagination::DEFAULT_MAX_PAGES;
use actionhub_core::resolver::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use actionhub_core::PartialResults;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_PREFIX: &str = "ACTIONHUB_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Overall item cap for list calls that do not set one.
    pub default_cap: Option<usize>,
    pub max_pages: u32,
    /// Return the items gathered so far when a later page fails.
    pub best_effort_partial_results: bool,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            default_cap: Some(1000),
            max_pages: DEFAULT_MAX_PAGES,
            best_effort_partial_results: false,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl RuntimeSettings {
    /// Defaults overridden by `ACTIONHUB_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().apply_overrides(|name| std::env::var(name).ok())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let settings: Self = FileFormat::from_path(path)?.parse(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies overrides from any variable source; `lookup` receives full variable names.
    pub fn apply_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let name = format!("{}{}", ENV_PREFIX, suffix);
            lookup(&name).map(|value| (name, value))
        };

        if let Some(v) = var("DEFAULT_PAGE_SIZE") {
            self.default_page_size = parse(v)?;
        }
        if let Some(v) = var("MAX_PAGE_SIZE") {
            self.max_page_size = parse(v)?;
        }
        if let Some((name, value)) = var("DEFAULT_CAP") {
            let disabled = matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "" | "none" | "0"
            );
            self.default_cap = if disabled {
                None
            } else {
                Some(parse((name, value))?)
            };
        }
        if let Some(v) = var("MAX_PAGES") {
            self.max_pages = parse(v)?;
        }
        if let Some(v) = var("BEST_EFFORT") {
            self.best_effort_partial_results = parse_bool(v)?;
        }
        if let Some(v) = var("CONNECT_TIMEOUT_SECS") {
            self.connect_timeout_secs = parse(v)?;
        }
        if let Some(v) = var("REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse(v)?;
        }
        if let Some((_, value)) = var("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(v) = var("JSON_LOGS") {
            self.json_logs = parse_bool(v)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(ConfigError::Validation(
                "page sizes must be at least 1".to_string(),
            ));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Validation(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        if self.max_pages == 0 {
            return Err(ConfigError::Validation(
                "max_pages must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn partial_results(&self) -> PartialResults {
        if self.best_effort_partial_results {
            PartialResults::BestEffort
        } else {
            PartialResults::Discard
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse<T: FromStr>((var, value): (String, String)) -> ConfigResult<T> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv { var, value })
}

fn parse_bool((var, value): (String, String)) -> ConfigResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn overrides_replace_defaults() {
        let settings = RuntimeSettings::default()
            .apply_overrides(lookup(&[
                ("ACTIONHUB_DEFAULT_PAGE_SIZE", "25"),
                ("ACTIONHUB_DEFAULT_CAP", "none"),
                ("ACTIONHUB_BEST_EFFORT", "yes"),
                ("ACTIONHUB_JSON_LOGS", "true"),
            ]))
            .unwrap();
        assert_eq!(settings.default_page_size, 25);
        assert_eq!(settings.default_cap, None);
        assert_eq!(settings.partial_results(), PartialResults::BestEffort);
        assert!(settings.json_logs);
        assert_eq!(settings.max_page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn malformed_override_names_the_variable() {
        let err = RuntimeSettings::default()
            .apply_overrides(lookup(&[("ACTIONHUB_MAX_PAGES", "lots")]))
            .unwrap_err();
        assert!(
            matches!(err, ConfigError::InvalidEnv { ref var, .. } if var == "ACTIONHUB_MAX_PAGES")
        );
    }

    #[test]
    fn incoherent_page_sizes_are_rejected() {
        let err = RuntimeSettings::default()
            .apply_overrides(lookup(&[("ACTIONHUB_DEFAULT_PAGE_SIZE", "500")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn yaml_file_fills_missing_fields_with_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "max_pages: 5\nrequest_timeout_secs: 3").unwrap();
        let settings = RuntimeSettings::load_from_file(file.path()).unwrap();
        assert_eq!(settings.max_pages, 5);
        assert_eq!(settings.request_timeout(), Duration::from_secs(3));
        assert_eq!(settings.default_page_size, DEFAULT_PAGE_SIZE);
    }
}
