use std::net::SocketAddr;
use std::str::FromStr;
use anyhow::{Context, Result};
use dotenvy::dotenv;
use crate::services::excel::DEFAULT_MAX_GRID_CELLS;

fn default_max_file_size() -> usize {
    // 10 MB in bytes
    10 * 1024 * 1024
}

fn default_fallback_years() -> Vec<i32> {
    (2022..=2026).collect()
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Per uploaded file.
    pub max_file_size: usize,
    /// Whole multipart request.
    pub max_request_size: usize,
    /// Cells a sheet may span from A1; larger sheets are skipped.
    pub max_grid_cells: usize,
    pub min_header_confidence: f64,
    pub fallback_years: Vec<i32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_file_size: default_max_file_size(),
            max_request_size: 10 * default_max_file_size(),
            max_grid_cells: DEFAULT_MAX_GRID_CELLS,
            min_header_confidence: 0.0,
            fallback_years: default_fallback_years(),
        }
    }
}

impl Config {
    pub fn new() -> Result<Self> {
        // Load .env file first
        dotenv().ok();

        let defaults = Config::default();
        let min_header_confidence = env_or("BUCA_MIN_HEADER_CONFIDENCE", defaults.min_header_confidence)?;
        if !(0.0..=1.0).contains(&min_header_confidence) {
            anyhow::bail!("BUCA_MIN_HEADER_CONFIDENCE must be between 0 and 1");
        }

        let fallback_years = match std::env::var("BUCA_FALLBACK_YEARS") {
            Ok(raw) => parse_years(&raw).context("Invalid BUCA_FALLBACK_YEARS")?,
            Err(_) => defaults.fallback_years,
        };

        Ok(Config {
            bind_addr: env_or("BUCA_BIND_ADDR", defaults.bind_addr)?,
            max_file_size: env_or("BUCA_MAX_FILE_SIZE", defaults.max_file_size)?,
            max_request_size: env_or("BUCA_MAX_REQUEST_SIZE", defaults.max_request_size)?,
            max_grid_cells: env_or("BUCA_MAX_GRID_CELLS", defaults.max_grid_cells)?,
            min_header_confidence,
            fallback_years,
        })
    }
}

pub fn load_config() -> Result<Config> {
    Config::new()
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Failed to parse {}={}", key, raw)),
        Err(_) => Ok(default),
    }
}

/// Parses a comma separated year list such as `2022,2023,2024`.
pub fn parse_years(raw: &str) -> Result<Vec<i32>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i32>()
                .with_context(|| format!("'{}' is not a year", part))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_year_lists() {
        assert_eq!(parse_years("2022, 2023,2024").unwrap(), vec![2022, 2023, 2024]);
        assert_eq!(parse_years("2022,,").unwrap(), vec![2022]);
        assert!(parse_years("2022,twenty").is_err());
    }

    #[test]
    fn defaults_cover_five_years() {
        let config = Config::default();
        assert_eq!(config.fallback_years, vec![2022, 2023, 2024, 2025, 2026]);
        assert_eq!(config.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.bind_addr.port(), 3000);
    }
}
