// Engine settings shared by the CLI and the API

use std::path::PathBuf;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LANGUAGES_CONFIG: &str = "config/languages.json";
pub const DEFAULT_API_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Budget for running a test file when the caller gives none
    pub default_timeout_ms: u64,
    /// Budget for the compile step of compiled languages
    pub compile_timeout_ms: u64,
    pub languages_config: PathBuf,
    pub api_addr: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            compile_timeout_ms: DEFAULT_COMPILE_TIMEOUT_MS,
            languages_config: PathBuf::from(DEFAULT_LANGUAGES_CONFIG),
            api_addr: DEFAULT_API_ADDR.to_string(),
        }
    }
}

impl EngineSettings {
    /// Read settings from `KATA_*` environment variables, falling back to defaults.
    /// Unparseable numbers fall back as well.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let number = |key: &str, fallback: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(fallback)
        };

        Self {
            default_timeout_ms: number("KATA_DEFAULT_TIMEOUT_MS", defaults.default_timeout_ms),
            compile_timeout_ms: number("KATA_COMPILE_TIMEOUT_MS", defaults.compile_timeout_ms),
            languages_config: lookup("KATA_LANGUAGES_CONFIG")
                .map(PathBuf::from)
                .unwrap_or(defaults.languages_config),
            api_addr: lookup("KATA_API_ADDR").unwrap_or(defaults.api_addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_when_unset() {
        let settings = EngineSettings::from_lookup(|_| None);
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn test_overrides_and_bad_numbers() {
        let env: HashMap<&str, &str> = [
            ("KATA_DEFAULT_TIMEOUT_MS", "2500"),
            ("KATA_COMPILE_TIMEOUT_MS", "not-a-number"),
            ("KATA_LANGUAGES_CONFIG", "/etc/kata/languages.json"),
        ]
        .into_iter()
        .collect();

        let settings = EngineSettings::from_lookup(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(settings.default_timeout_ms, 2500);
        assert_eq!(settings.compile_timeout_ms, DEFAULT_COMPILE_TIMEOUT_MS);
        assert_eq!(settings.languages_config, PathBuf::from("/etc/kata/languages.json"));
        assert_eq!(settings.api_addr, DEFAULT_API_ADDR);
    }
}
