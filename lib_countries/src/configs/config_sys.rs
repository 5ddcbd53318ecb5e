//! # Runtime Configuration
//!
//! Loads up to three optional JSON files from one directory, later files
//! overriding earlier ones:
//!
//! 1. `config.global.json`: settings shared by every binary.
//! 2. `<app>.common.json`: settings of one binary in every mode.
//! 3. `<app>.<mode>.json`: settings of one binary in one running mode.
//!
//! The directory is `CONFIGS_LOCATION` (default: the working directory) and the
//! mode comes from `RUNNING_MODE_<APP>` (default: `production`). Nested keys are
//! flattened with `:` and arrays become `key:0`, `key:1`, ...; all keys are
//! lower-cased.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::{env, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use config::{ext::*, *};

const CONFIG_GLOBAL_NAME: &str = "config.global.json";
const DEFAULT_RUNNING_MODE: &str = "production";

#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("I/O error occurred: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    VarError(#[from] env::VarError),

    #[error("Failed to build configuration: {0}")]
    BuildError(String),
}

#[derive(Default, Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeConfig {
    pub config_running_mode: String,
    pub config_dir: String,
    /// Files that existed and were loaded, lowest precedence first.
    pub config_files: Vec<String>,
    pub config_options: BTreeMap<String, String>,
}

impl RuntimeConfig {
    /// The value at `key` (case-insensitive).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.config_options.get(&key.to_lowercase()).map(String::as_str)
    }

    /// Parses the value at `key`. `None` if missing or unparsable.
    pub fn get_parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    /// A list at `key`: either a JSON array (`key:0`, `key:1`, ...) or a
    /// comma separated string.
    ///
    /// A flattened array also leaves an empty value at `key` itself, so a
    /// blank scalar defers to the indexed entries.
    pub fn get_list(&self, key: &str) -> Option<Vec<String>> {
        if let Some(value) = self.get(key).filter(|v| !v.trim().is_empty()) {
            return Some(split_list(value));
        }
        let prefix = format!("{}:", key.to_lowercase());
        let mut indexed: Vec<(usize, &String)> = self
            .config_options
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(&prefix)?.parse::<usize>().ok().map(|i| (i, v)))
            .collect();
        if indexed.is_empty() {
            return None;
        }
        indexed.sort_by_key(|(i, _)| *i);
        Some(indexed.into_iter().map(|(_, v)| v.trim().to_string()).collect())
    }
}

impl fmt::Display for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RuntimeConfig
    Running mode: {},
    Config dir: {},
    Files: {:?},
    Options: {:?}
",
            self.config_running_mode, self.config_dir, self.config_files, self.config_options
        )
    }
}

/// Splits a comma separated list, dropping blanks.
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Loads the configuration of `app_name` from the environment-selected
/// directory and mode.
pub fn get_runtime_config(app_name: &str) -> Result<RuntimeConfig, RuntimeConfigError> {
    let config_dir = match env::var("CONFIGS_LOCATION") {
        Ok(dir) => PathBuf::from(dir),
        Err(env::VarError::NotPresent) => env::current_dir()?,
        Err(e) => return Err(e.into()),
    };
    let running_mode = get_running_mode(app_name)?;
    load_runtime_config(&config_dir, app_name, &running_mode)
}

/// Loads the configuration of `app_name` in `running_mode` from `config_dir`.
/// Missing files are skipped.
pub fn load_runtime_config(
    config_dir: &Path,
    app_name: &str,
    running_mode: &str,
) -> Result<RuntimeConfig, RuntimeConfigError> {
    let candidates = [
        config_dir.join(CONFIG_GLOBAL_NAME),
        config_dir.join(format!("{app_name}.common.json")),
        config_dir.join(format!("{app_name}.{running_mode}.json")),
    ];
    let config_files: Vec<String> = candidates
        .iter()
        .filter(|path| path.is_file())
        .map(|path| path.to_string_lossy().to_string())
        .collect();

    let mut builder = DefaultConfigurationBuilder::new();
    for file in &config_files {
        builder.add_json_file(&file.is().optional());
    }
    let config_data: Box<dyn ConfigurationRoot> = builder
        .build()
        .map_err(|e| RuntimeConfigError::BuildError(format!("{e:?}")))?;

    let mut config_options: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in config_data.iter(None) {
        config_options.insert(key.to_lowercase(), value.to_string());
    }

    Ok(RuntimeConfig {
        config_running_mode: running_mode.to_string(),
        config_dir: config_dir.to_string_lossy().to_string(),
        config_files,
        config_options,
    })
}

fn get_running_mode(app_name: &str) -> Result<String, RuntimeConfigError> {
    let envar = format!("RUNNING_MODE_{}", app_name.to_uppercase());
    match env::var(&envar) {
        Ok(mode) if !mode.trim().is_empty() => Ok(mode.trim().to_string()),
        Ok(_) | Err(env::VarError::NotPresent) => Ok(DEFAULT_RUNNING_MODE.to_string()),
        Err(e) => Err(RuntimeConfigError::VarError(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn later_files_override_earlier_ones() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("config.global.json"),
            r#"{"LogLevel": "warn", "Port": 7000}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("server_countries.common.json"),
            r#"{"Port": 8000, "RatesEndpoints": ["https://a/rates", "https://b/rates"]}"#,
        )
        .unwrap();
        fs::write(dir.path().join("server_countries.staging.json"), r#"{"Port": 8100}"#).unwrap();

        let config = load_runtime_config(dir.path(), "server_countries", "staging").unwrap();

        assert_eq!(config.config_files.len(), 3);
        assert_eq!(config.get_parsed::<u16>("port"), Some(8100));
        assert_eq!(config.get("LOGLEVEL"), Some("warn"));
        assert_eq!(
            config.get_list("ratesendpoints").unwrap(),
            ["https://a/rates", "https://b/rates"]
        );
    }

    #[test]
    fn missing_files_yield_empty_options() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_runtime_config(dir.path(), "server_countries", "production").unwrap();
        assert!(config.config_files.is_empty());
        assert!(config.config_options.is_empty());
        assert_eq!(config.get("port"), None);
    }

    #[test]
    fn comma_separated_lists() {
        let mut config = RuntimeConfig::default();
        config
            .config_options
            .insert("countriesendpoints".into(), " https://a , ,https://b".into());
        assert_eq!(config.get_list("CountriesEndpoints").unwrap(), ["https://a", "https://b"]);
        assert_eq!(config.get_list("absent"), None);
    }

    #[test]
    fn flattened_array_wins_over_its_blank_parent_key() {
        let mut config = RuntimeConfig::default();
        for (k, v) in [
            ("ratesendpoints", ""),
            ("ratesendpoints:1", "https://b/rates"),
            ("ratesendpoints:0", "https://a/rates"),
        ] {
            config.config_options.insert(k.into(), v.into());
        }
        assert_eq!(config.get_list("RatesEndpoints").unwrap(), ["https://a/rates", "https://b/rates"]);
    }
}
