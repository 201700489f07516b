// Toolchain configuration for the execution pipelines
use anyhow::{bail, Context, Result};
use kata_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageConfig {
    pub name: Language,
    pub extension: String,
    /// Interpreter, or the runtime that executes compiled output (node for TypeScript)
    pub command: String,
    /// Compiler for languages with a build step
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<LanguageConfig>,
}

/// Language configuration manager
#[derive(Debug, Clone)]
pub struct LanguageConfigManager {
    configs: HashMap<Language, LanguageConfig>,
}

impl Default for LanguageConfigManager {
    fn default() -> Self {
        Self::builtin()
    }
}

impl LanguageConfigManager {
    /// Built-in toolchains resolved from `PATH`
    pub fn builtin() -> Self {
        let entries = [
            (Language::Python, "python3", None),
            (Language::JavaScript, "node", None),
            (Language::TypeScript, "node", Some("tsc")),
            (Language::Cpp, "", Some("g++")),
        ];

        let configs = entries
            .into_iter()
            .map(|(language, command, compiler)| {
                let config = LanguageConfig {
                    name: language,
                    extension: language.extension().to_string(),
                    command: command.to_string(),
                    compiler: compiler.map(str::to_string),
                    enabled: true,
                };
                (language, config)
            })
            .collect();

        Self { configs }
    }

    /// Load language configurations from a languages.json file.
    /// Entries override the built-in toolchains; languages not listed keep their defaults.
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let languages_json: LanguagesJson = serde_json::from_str(content)?;

        let mut manager = Self::builtin();
        for lang in languages_json.languages {
            if lang.extension.trim_start_matches('.') != lang.name.extension() {
                bail!(
                    "Extension '{}' does not match language '{}'",
                    lang.extension,
                    lang.name
                );
            }
            debug!(language = %lang.name, command = %lang.command, "Loaded language config");
            manager.configs.insert(lang.name, lang);
        }

        Ok(manager)
    }

    /// Load from `path` if it exists, otherwise use the built-in toolchains.
    pub fn load_or_builtin(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(path = %path.display(), "No language config found, using built-in toolchains");
            Ok(Self::builtin())
        }
    }

    /// Get configuration for a specific language
    pub fn get_config(&self, language: &Language) -> Result<&LanguageConfig> {
        self.configs
            .get(language)
            .ok_or_else(|| anyhow::anyhow!("No configuration found for language: {}", language))
    }

    /// A language is runnable when it has a pipeline and is not switched off
    pub fn is_enabled(&self, language: &Language) -> bool {
        language.is_implemented() && self.get_config(language).map(|c| c.enabled).unwrap_or(false)
    }

    /// Interpreter or runtime binary for a language
    pub fn command_for(&self, language: &Language) -> Result<String> {
        Ok(self.get_config(language)?.command.clone())
    }

    /// Compiler binary for a language
    pub fn compiler_for(&self, language: &Language) -> Result<String> {
        self.get_config(language)?
            .compiler
            .clone()
            .ok_or_else(|| anyhow::anyhow!("No compiler configured for language: {}", language))
    }

    /// File extension (no leading dot) for a language
    pub fn extension_for(&self, language: &Language) -> Result<String> {
        Ok(self
            .get_config(language)?
            .extension
            .trim_start_matches('.')
            .to_string())
    }

    /// List all enabled languages
    pub fn list_languages(&self) -> Vec<Language> {
        Language::ALL
            .into_iter()
            .filter(|lang| self.is_enabled(lang))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_toolchains() {
        let manager = LanguageConfigManager::builtin();
        assert_eq!(manager.command_for(&Language::Python).unwrap(), "python3");
        assert_eq!(manager.compiler_for(&Language::TypeScript).unwrap(), "tsc");
        assert_eq!(manager.compiler_for(&Language::Cpp).unwrap(), "g++");
        assert!(manager.compiler_for(&Language::Python).is_err());
        assert_eq!(manager.extension_for(&Language::Cpp).unwrap(), "cpp");
        assert!(manager.get_config(&Language::Go).is_err());
        assert_eq!(
            manager.list_languages(),
            vec![Language::Python, Language::JavaScript, Language::TypeScript, Language::Cpp]
        );
    }

    #[test]
    fn test_json_overrides_and_disables() {
        let json = r#"{
            "languages": [
                { "name": "python", "extension": ".py", "command": "/opt/python3.12/bin/python3" },
                { "name": "cpp", "extension": "cpp", "command": "", "compiler": "clang++", "enabled": false }
            ]
        }"#;

        let manager = LanguageConfigManager::from_json(json).unwrap();
        assert_eq!(
            manager.command_for(&Language::Python).unwrap(),
            "/opt/python3.12/bin/python3"
        );
        assert!(!manager.is_enabled(&Language::Cpp));
        assert!(manager.is_enabled(&Language::JavaScript));
    }

    #[test]
    fn test_unimplemented_language_never_enabled() {
        let json = r#"{ "languages": [ { "name": "java", "extension": "java", "command": "java" } ] }"#;
        let manager = LanguageConfigManager::from_json(json).unwrap();
        assert!(!manager.is_enabled(&Language::Java));
    }

    #[test]
    fn test_shipped_config_matches_builtin() {
        let shipped = include_str!("../../../config/languages.json");
        let manager = LanguageConfigManager::from_json(shipped).unwrap();
        assert_eq!(manager.list_languages(), LanguageConfigManager::builtin().list_languages());
        assert_eq!(manager.compiler_for(&Language::TypeScript).unwrap(), "tsc");
    }

    #[test]
    fn test_mismatched_extension_rejected() {
        let json = r#"{ "languages": [ { "name": "python", "extension": "js", "command": "node" } ] }"#;
        assert!(LanguageConfigManager::from_json(json).is_err());
    }

    #[test]
    fn test_missing_file_errors_but_fallback_loads() {
        let path = Path::new("/nonexistent/languages.json");
        assert!(LanguageConfigManager::load(path).is_err());
        assert!(LanguageConfigManager::load_or_builtin(path).is_ok());
    }
}
