//! Server configuration resolved from CLI flags, then environment variables,
//! then built-in defaults.

use std::env;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_DATA_DIR: &str = "data/csv";
pub const DEFAULT_MAX_BULK: usize = 1000;
pub const DEFAULT_PAGE_LIMIT: usize = 100;
pub const DEFAULT_MAX_PAGE_LIMIT: usize = 10_000;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid port for {source_name}: {value:?}")]
    InvalidPort { source_name: String, value: String },
    #[error("invalid number for {source_name}: {value:?}")]
    InvalidNumber { source_name: String, value: String },
    #[error("missing value after flag {0}")]
    MissingValue(String),
    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),
    #[error("default page limit {default} exceeds max page limit {max}")]
    LimitOrder { default: usize, max: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind: String,
    pub http_port: u16,
    pub data_dir: PathBuf,
    pub metadata_dir: PathBuf,
    /// `["*"]` allows any origin.
    pub cors_origins: Vec<String>,
    pub max_bulk_items: usize,
    pub default_page_limit: usize,
    pub max_page_limit: usize,
}

impl ServerConfig {
    /// Defaults rooted at `data_dir`; metadata lives next to it.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let metadata_dir = default_metadata_dir(&data_dir);
        Self {
            bind: DEFAULT_BIND.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            data_dir,
            metadata_dir,
            cors_origins: vec!["*".to_string()],
            max_bulk_items: DEFAULT_MAX_BULK,
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: DEFAULT_MAX_PAGE_LIMIT,
        }
    }

    pub fn from_env_and_args(args: &[String]) -> Result<Self, ConfigError> {
        Self::resolve(args, |name| env::var(name).ok())
    }

    /// Resolution with an injectable environment lookup so tests never touch process env.
    pub fn resolve<F>(args: &[String], lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = flag_value(args, "--data-dir")?
            .or_else(|| lookup("CSV_DATA_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let mut cfg = Self::with_data_dir(data_dir);

        if let Some(dir) = flag_value(args, "--metadata-dir")?.or_else(|| lookup("CSV_METADATA_DIR")) {
            cfg.metadata_dir = PathBuf::from(dir);
        }
        if let Some(bind) = flag_value(args, "--bind")?.or_else(|| lookup("CSVDATA_BIND")) {
            cfg.bind = bind;
        }
        if let Some((src, raw)) = sourced(flag_value(args, "--http-port")?, "--http-port", lookup("CSVDATA_HTTP_PORT"), "CSVDATA_HTTP_PORT") {
            cfg.http_port = raw.parse::<u16>().map_err(|_| ConfigError::InvalidPort { source_name: src.to_string(), value: raw.clone() })?;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            let list: Vec<String> = origins.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
            if !list.is_empty() { cfg.cors_origins = list; }
        }
        if let Some(v) = lookup("CSVDATA_MAX_BULK") { cfg.max_bulk_items = parse_count("CSVDATA_MAX_BULK", &v)?; }
        if let Some(v) = lookup("CSVDATA_DEFAULT_LIMIT") { cfg.default_page_limit = parse_count("CSVDATA_DEFAULT_LIMIT", &v)?; }
        if let Some(v) = lookup("CSVDATA_MAX_LIMIT") { cfg.max_page_limit = parse_count("CSVDATA_MAX_LIMIT", &v)?; }

        if cfg.max_bulk_items == 0 { return Err(ConfigError::ZeroLimit("CSVDATA_MAX_BULK")); }
        if cfg.default_page_limit == 0 { return Err(ConfigError::ZeroLimit("CSVDATA_DEFAULT_LIMIT")); }
        if cfg.default_page_limit > cfg.max_page_limit {
            return Err(ConfigError::LimitOrder { default: cfg.default_page_limit, max: cfg.max_page_limit });
        }
        Ok(cfg)
    }

    pub fn cors_allows_any(&self) -> bool { self.cors_origins.iter().any(|o| o == "*") }
}

/// `<parent of data_dir>/metadata`, or `./metadata` for a bare relative name.
pub fn default_metadata_dir(data_dir: &Path) -> PathBuf {
    match data_dir.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.join("metadata"),
        _ => PathBuf::from("metadata"),
    }
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

pub const USAGE: &str = "csvdata server\n\nUSAGE:\n  csvdata_server [--bind ADDR] [--http-port N] [--data-dir PATH] [--metadata-dir PATH]\n\nOPTIONS:\n  --bind ADDR           Listen address (env: CSVDATA_BIND, default 0.0.0.0)\n  --http-port N         HTTP API port (env: CSVDATA_HTTP_PORT, default 8000)\n  --data-dir PATH       Dataset folder (env: CSV_DATA_DIR, default data/csv)\n  --metadata-dir PATH   Metadata folder (env: CSV_METADATA_DIR, default <data-dir>/../metadata)\n\nENVIRONMENT:\n  CORS_ORIGINS          Comma-separated allowed origins (default *)\n  CSVDATA_MAX_BULK      Max items per bulk request (default 1000)\n  CSVDATA_DEFAULT_LIMIT Default page size (default 100)\n  CSVDATA_MAX_LIMIT     Max page size (default 10000)\n  RUST_LOG              tracing filter (default info)\n";

fn flag_value(args: &[String], flag: &str) -> Result<Option<String>, ConfigError> {
    let mut i = 0;
    while i < args.len() {
        if args[i] == flag {
            return match args.get(i + 1) {
                Some(v) if !v.starts_with("--") => Ok(Some(v.clone())),
                _ => Err(ConfigError::MissingValue(flag.to_string())),
            };
        }
        i += 1;
    }
    Ok(None)
}

fn sourced(arg: Option<String>, arg_name: &'static str, env_val: Option<String>, env_name: &'static str) -> Option<(&'static str, String)> {
    arg.map(|v| (arg_name, v)).or_else(|| env_val.map(|v| (env_name, v)))
}

fn parse_count(name: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim().parse::<usize>().map_err(|_| ConfigError::InvalidNumber { source_name: name.to_string(), value: raw.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> { list.iter().map(|s| s.to_string()).collect() }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = ServerConfig::resolve(&[], env_of(&[])).unwrap();
        assert_eq!(cfg.http_port, 8000);
        assert_eq!(cfg.data_dir, PathBuf::from("data/csv"));
        assert_eq!(cfg.metadata_dir, PathBuf::from("data/metadata"));
        assert_eq!(cfg.max_bulk_items, 1000);
        assert!(cfg.cors_allows_any());
    }

    #[test]
    fn flags_override_environment() {
        let env = env_of(&[("CSV_DATA_DIR", "/srv/csv"), ("CSVDATA_HTTP_PORT", "9000")]);
        let cfg = ServerConfig::resolve(&args(&["bin", "--http-port", "9100", "--data-dir", "/var/csv"]), env).unwrap();
        assert_eq!(cfg.http_port, 9100);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/csv"));
        assert_eq!(cfg.metadata_dir, PathBuf::from("/var/metadata"));
    }

    #[test]
    fn environment_applies_without_flags() {
        let env = env_of(&[
            ("CSVDATA_HTTP_PORT", "9000"),
            ("CORS_ORIGINS", "http://a.test, http://b.test"),
            ("CSVDATA_MAX_BULK", "50"),
            ("CSV_METADATA_DIR", "/meta"),
        ]);
        let cfg = ServerConfig::resolve(&[], env).unwrap();
        assert_eq!(cfg.http_port, 9000);
        assert_eq!(cfg.cors_origins, vec!["http://a.test".to_string(), "http://b.test".to_string()]);
        assert!(!cfg.cors_allows_any());
        assert_eq!(cfg.max_bulk_items, 50);
        assert_eq!(cfg.metadata_dir, PathBuf::from("/meta"));
    }

    #[test]
    fn invalid_values_are_errors() {
        let err = ServerConfig::resolve(&[], env_of(&[("CSVDATA_HTTP_PORT", "http")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { .. }));
        let err = ServerConfig::resolve(&args(&["bin", "--data-dir"]), env_of(&[])).unwrap_err();
        assert_eq!(err, ConfigError::MissingValue("--data-dir".to_string()));
        let err = ServerConfig::resolve(&[], env_of(&[("CSVDATA_MAX_BULK", "0")])).unwrap_err();
        assert_eq!(err, ConfigError::ZeroLimit("CSVDATA_MAX_BULK"));
        let err = ServerConfig::resolve(&[], env_of(&[("CSVDATA_DEFAULT_LIMIT", "500"), ("CSVDATA_MAX_LIMIT", "200")])).unwrap_err();
        assert_eq!(err, ConfigError::LimitOrder { default: 500, max: 200 });
    }
}
