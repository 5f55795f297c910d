use crate::error::ConfigError;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_ORIGIN: &str = "http://localhost:5000";

#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the plate API; endpoints are joined below it.
    pub base_url: Url,
    pub detection_limit: usize,
    pub stats_interval: Duration,
    pub listen_port: u16,
    pub image_dir: PathBuf,
    pub delete_reason: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let origin = env::var("DASHBOARD_ORIGIN").ok();
        Ok(Config {
            base_url: resolve_base_url(origin.as_deref())?,
            detection_limit: parse_var("DETECTION_LIMIT", 20)?,
            stats_interval: Duration::from_secs(parse_var("STATS_INTERVAL_SECS", 30)?),
            listen_port: parse_var("LISTEN_PORT", 8403)?,
            image_dir: PathBuf::from(env::var("IMAGE_DIR").unwrap_or_else(|_| "plates".to_string())),
            delete_reason: env::var("DELETE_REASON").unwrap_or_else(|_| "deleted_by_ui".to_string()),
        })
    }
}

/// Picks the API root from the page origin, falling back to the local
/// development server when there is no usable origin.
pub fn resolve_base_url(origin: Option<&str>) -> Result<Url, ConfigError> {
    let origin = match origin.map(str::trim) {
        Some(o) if !o.is_empty() && o != "null" => o,
        _ => DEFAULT_ORIGIN,
    };
    let url = Url::parse(origin)
        .map_err(|e| ConfigError::InvalidOrigin(origin.to_string(), e.to_string()))?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidOrigin(
            origin.to_string(),
            "expected an http(s) URL".to_string(),
        ));
    }
    Ok(url)
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(name, v)),
        Err(_) => Ok(default),
    }
}
