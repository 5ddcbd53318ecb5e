use clap::Parser;
use lib_countries::configs::{get_runtime_config, RuntimeConfig};
use lib_countries::loggers::LogSettings;
use lib_countries::sources::countries::DEFAULT_COUNTRY_ENDPOINTS;
use lib_countries::sources::rates::DEFAULT_RATE_ENDPOINTS;
use std::path::PathBuf;
use std::time::Duration;

pub const APP_NAME: &str = "server_countries";

/// Accepted range for the per-endpoint timeout, in seconds.
const SOURCE_TIMEOUT_RANGE: (u64, u64) = (15, 30);

#[derive(Parser, Debug, Clone, Default)]
#[clap(about = "Country metadata and exchange rate REST service", version)]
pub struct Config {
    #[clap(long, env = "PORT", help = "Port to listen on.")]
    pub port: Option<u16>,

    #[clap(long, env = "DATABASE_URL", help = "PostgreSQL connection URL. Omit to keep records in memory.")]
    pub database_url: Option<String>,

    #[clap(long, env = "DB_MAX_CONNECTIONS", help = "Maximum pooled database connections.")]
    pub db_max_connections: Option<u32>,

    #[clap(long, env = "CACHE_DIR", help = "Directory for the cached summary image.")]
    pub cache_dir: Option<PathBuf>,

    #[clap(long, env = "LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "LOG_JSON", help = "Emit JSON log lines (true/false).")]
    pub log_json: Option<bool>,

    #[clap(long, env = "RATES_ENDPOINTS", value_delimiter = ',', help = "Exchange rate endpoints, in priority order.")]
    pub rates_endpoints: Option<Vec<String>>,

    #[clap(long, env = "COUNTRIES_ENDPOINTS", value_delimiter = ',', help = "Country data endpoints, in priority order.")]
    pub countries_endpoints: Option<Vec<String>>,

    #[clap(long, env = "SOURCE_TIMEOUT_SECS", help = "Timeout per upstream request in seconds (15-30).")]
    pub source_timeout_secs: Option<u64>,

    #[clap(long, env = "SOURCE_RETRIES", help = "Retries per upstream endpoint on transient failures.")]
    pub source_retries: Option<u32>,

    #[clap(long, env = "REFRESH_BUDGET_SECS", help = "Wall-clock budget of one refresh in seconds.")]
    pub refresh_budget_secs: Option<u64>,

    #[clap(long, env = "MAX_REPORTED_ERRORS", help = "Per-entry errors kept in a refresh report.")]
    pub max_reported_errors: Option<usize>,

    #[clap(long, env = "SUMMARY_TOP_N", help = "Countries ranked on the summary image.")]
    pub summary_top_n: Option<usize>,
}

impl Config {
    /// Built-in defaults for every setting except the database URL.
    pub fn defaults() -> Config {
        Config {
            port: Some(8000),
            database_url: None,
            db_max_connections: Some(5),
            cache_dir: Some(PathBuf::from("./cache")),
            log_dir: Some(PathBuf::from("./logs")),
            log_level: Some("info".to_string()),
            log_json: Some(false),
            rates_endpoints: Some(DEFAULT_RATE_ENDPOINTS.iter().map(|s| s.to_string()).collect()),
            countries_endpoints: Some(DEFAULT_COUNTRY_ENDPOINTS.iter().map(|s| s.to_string()).collect()),
            source_timeout_secs: Some(15),
            source_retries: Some(0),
            refresh_budget_secs: Some(45),
            max_reported_errors: Some(10),
            summary_top_n: Some(5),
        }
    }

    /// Reads the settings present in the layered JSON files. Keys may be
    /// written `snake_case` or `PascalCase` (`DatabaseUrl`).
    pub fn from_runtime(runtime: &RuntimeConfig) -> Config {
        let get = |key: &str| runtime.get(key).or_else(|| runtime.get(&key.replace('_', "")));
        let parsed = |key: &str| {
            runtime
                .get_parsed::<u64>(key)
                .or_else(|| runtime.get_parsed::<u64>(&key.replace('_', "")))
        };
        let list = |key: &str| {
            runtime
                .get_list(key)
                .or_else(|| runtime.get_list(&key.replace('_', "")))
                .filter(|l| !l.is_empty())
        };

        Config {
            port: parsed("port").and_then(|p| u16::try_from(p).ok()),
            database_url: get("database_url").map(str::to_string).filter(|s| !s.is_empty()),
            db_max_connections: parsed("db_max_connections").and_then(|n| u32::try_from(n).ok()),
            cache_dir: get("cache_dir").map(PathBuf::from),
            log_dir: get("log_dir").map(PathBuf::from),
            log_level: get("log_level").map(str::to_string),
            log_json: get("log_json").and_then(|v| v.trim().to_lowercase().parse().ok()),
            rates_endpoints: list("rates_endpoints"),
            countries_endpoints: list("countries_endpoints"),
            source_timeout_secs: parsed("source_timeout_secs"),
            source_retries: parsed("source_retries").and_then(|n| u32::try_from(n).ok()),
            refresh_budget_secs: parsed("refresh_budget_secs"),
            max_reported_errors: parsed("max_reported_errors").map(|n| n as usize),
            summary_top_n: parsed("summary_top_n").map(|n| n as usize),
        }
    }

    // Merge two Config structs, where 'other' overrides 'self' for Some values
    pub fn merge(self, other: Config) -> Config {
        Config {
            port: other.port.or(self.port),
            database_url: other.database_url.or(self.database_url),
            db_max_connections: other.db_max_connections.or(self.db_max_connections),
            cache_dir: other.cache_dir.or(self.cache_dir),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            log_json: other.log_json.or(self.log_json),
            rates_endpoints: other.rates_endpoints.or(self.rates_endpoints),
            countries_endpoints: other.countries_endpoints.or(self.countries_endpoints),
            source_timeout_secs: other.source_timeout_secs.or(self.source_timeout_secs),
            source_retries: other.source_retries.or(self.source_retries),
            refresh_budget_secs: other.refresh_budget_secs.or(self.refresh_budget_secs),
            max_reported_errors: other.max_reported_errors.or(self.max_reported_errors),
            summary_top_n: other.summary_top_n.or(self.summary_top_n),
        }
    }

    /// Fills anything still unset from [`Config::defaults`] and normalizes.
    pub fn into_settings(self) -> Settings {
        let c = Config::defaults().merge(self);
        let (min_timeout, max_timeout) = SOURCE_TIMEOUT_RANGE;

        Settings {
            port: c.port.unwrap_or(8000),
            database_url: c.database_url,
            db_max_connections: c.db_max_connections.unwrap_or(5).max(1),
            cache_dir: c.cache_dir.unwrap_or_else(|| PathBuf::from("./cache")),
            log_dir: c.log_dir.unwrap_or_else(|| PathBuf::from("./logs")),
            log_level: c.log_level.unwrap_or_else(|| "info".to_string()),
            log_json: c.log_json.unwrap_or(false),
            rates_endpoints: non_blank(c.rates_endpoints.unwrap_or_default()),
            countries_endpoints: non_blank(c.countries_endpoints.unwrap_or_default()),
            source_timeout: Duration::from_secs(c.source_timeout_secs.unwrap_or(min_timeout).clamp(min_timeout, max_timeout)),
            source_retries: c.source_retries.unwrap_or(0),
            refresh_budget: Duration::from_secs(c.refresh_budget_secs.unwrap_or(45).max(1)),
            max_reported_errors: c.max_reported_errors.unwrap_or(10),
            summary_top_n: c.summary_top_n.unwrap_or(5).max(1),
        }
    }
}

fn non_blank(list: Vec<String>) -> Vec<String> {
    list.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub cache_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub log_json: bool,
    pub rates_endpoints: Vec<String>,
    pub countries_endpoints: Vec<String>,
    pub source_timeout: Duration,
    pub source_retries: u32,
    pub refresh_budget: Duration,
    pub max_reported_errors: usize,
    pub summary_top_n: usize,
}

impl Settings {
    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            app_name: APP_NAME.to_string(),
            level: self.log_level.clone(),
            log_dir: Some(self.log_dir.clone()),
            json: self.log_json,
            ..Default::default()
        }
    }
}

/// Resolves the settings: defaults, then the layered JSON files, then
/// environment variables and CLI arguments.
pub fn load_config() -> anyhow::Result<Settings> {
    // 1. Defaults are applied last by `into_settings`, underneath everything.
    // 2. Layered JSON files (config.global.json, <app>.common.json, <app>.<mode>.json)
    let runtime = get_runtime_config(APP_NAME)?;
    let file_config = Config::from_runtime(&runtime);

    // 3. Environment variables and CLI arguments
    let cli_config = Config::parse();

    Ok(file_config.merge(cli_config).into_settings())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime(pairs: &[(&str, &str)]) -> RuntimeConfig {
        let mut runtime = RuntimeConfig::default();
        for (k, v) in pairs {
            runtime.config_options.insert(k.to_string(), v.to_string());
        }
        runtime
    }

    #[test]
    fn defaults_resolve_without_any_source() {
        let settings = Config::default().into_settings();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.database_url, None);
        assert_eq!(settings.source_timeout, Duration::from_secs(15));
        assert_eq!(settings.source_retries, 0);
        assert_eq!(settings.refresh_budget, Duration::from_secs(45));
        assert_eq!(settings.rates_endpoints.len(), 2);
        assert_eq!(settings.countries_endpoints.len(), 2);
        assert_eq!(settings.max_reported_errors, 10);
        assert_eq!(settings.summary_top_n, 5);
    }

    #[test]
    fn file_values_in_either_key_style() {
        let file = Config::from_runtime(&runtime(&[
            ("port", "9100"),
            ("databaseurl", "postgres://db/countries"),
            ("rates_endpoints", ""),
            ("rates_endpoints:0", "https://a/rates"),
            ("rates_endpoints:1", "https://b/rates"),
            ("countriesendpoints", "https://c/all"),
            ("logjson", "TRUE"),
            ("sourceretries", "2"),
        ]));

        let settings = file.into_settings();
        assert_eq!(settings.port, 9100);
        assert_eq!(settings.database_url.as_deref(), Some("postgres://db/countries"));
        assert_eq!(settings.rates_endpoints, ["https://a/rates", "https://b/rates"]);
        assert_eq!(settings.countries_endpoints, ["https://c/all"]);
        assert!(settings.log_json);
        assert_eq!(settings.source_retries, 2);
    }

    #[test]
    fn cli_overrides_file() {
        let file = Config { port: Some(9100), log_level: Some("warn".into()), ..Default::default() };
        let cli = Config::try_parse_from(["server_countries", "--port", "9200", "--rates-endpoints", "https://x, https://y"])
            .unwrap();

        let settings = file.merge(cli).into_settings();
        assert_eq!(settings.port, 9200);
        assert_eq!(settings.log_level, "warn");
        assert_eq!(settings.rates_endpoints, ["https://x", "https://y"]);
    }

    #[test]
    fn source_timeout_is_clamped() {
        let short = Config { source_timeout_secs: Some(2), ..Default::default() }.into_settings();
        let long = Config { source_timeout_secs: Some(120), ..Default::default() }.into_settings();
        assert_eq!(short.source_timeout, Duration::from_secs(15));
        assert_eq!(long.source_timeout, Duration::from_secs(30));
    }
}
