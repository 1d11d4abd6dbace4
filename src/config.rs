//! # Configuration Management
//!
//! This module handles loading and parsing configuration from the mackerel-config.toml
//! file. It provides a centralized way to configure the forecast provider, the area
//! and parameters to fetch, request pacing, and hotspot scoring.
//!
//! The provider API key is never stored in the file: `provider.api_key_env` names
//! the environment variable that holds it.

use crate::sweep::Pacing;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "mackerel-config.toml";

/// Application configuration loaded from mackerel-config.toml
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Forecast API endpoint and request format
    pub provider: ProviderConfig,
    /// Area cube fetch settings
    pub area: AreaConfig,
    /// Water mask sampling and point sweep settings
    pub sweep: SweepConfig,
    /// Hotspot scoring settings
    pub hotspots: HotspotConfig,
    /// Grid snapshot cache settings
    pub cache: CacheConfig,
}

/// Forecast EDR API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Base URL of the EDR API, without trailing slash
    pub base_url: String,
    /// Collection used for area (cube) queries
    pub collection: String,
    /// Collection used for point (position) queries
    pub point_collection: String,
    /// Coordinate reference system sent with every query
    pub crs: String,
    /// Response format requested from the provider
    pub format: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

/// Area cube fetch configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AreaConfig {
    /// Bounding box as "lonMin,latMin,lonMax,latMax"
    pub bbox: String,
    /// Provider parameter names to fetch
    pub parameters: Vec<String>,
    /// Parameters per request; 1 keeps responses small and within rate limits
    pub batch_size: usize,
    /// Pause between batch requests in milliseconds
    pub batch_delay_ms: u64,
}

/// Water mask point sweep configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SweepConfig {
    /// GeoJSON FeatureCollection with water polygons
    pub mask_path: PathBuf,
    /// Sampling grid step in degrees
    pub step_degrees: f64,
    /// Pause between point requests in milliseconds
    pub point_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HotspotConfig {
    /// Minimum suitability for a hotspot
    pub threshold: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    /// Gzip-compressed JSON snapshot of the assembled grid
    pub snapshot_path: PathBuf,
    /// Snapshot time-to-live in minutes
    pub ttl_minutes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: ProviderConfig {
                base_url: "https://dmigw.govcloud.dk/v1/forecastedr".to_string(),
                collection: "dkss_nsbs".to_string(), // North Sea / Baltic Sea
                point_collection: "dkss_idw".to_string(), // Inner Danish waters, finer grid
                crs: "crs84".to_string(),
                format: "CoverageJSON".to_string(),
                api_key_env: "DMI_API_KEY".to_string(),
                user_agent: "mackerel-tracker".to_string(),
            },
            area: AreaConfig {
                // Swedish west coast, Öresund and the southern Baltic up to Stockholm
                bbox: "10.3,54.9,16.6,59.6".to_string(),
                parameters: vec![
                    "current-u".to_string(),
                    "current-v".to_string(),
                    "water-temperature".to_string(),
                    "salinity".to_string(),
                ],
                batch_size: 1,
                batch_delay_ms: 2000,
            },
            sweep: SweepConfig {
                mask_path: PathBuf::from("data/scandinavian-waters.geojson"),
                step_degrees: 0.05,
                point_delay_ms: 150,
            },
            hotspots: HotspotConfig {
                threshold: crate::suitability::DEFAULT_THRESHOLD,
            },
            cache: CacheConfig {
                snapshot_path: PathBuf::from("/tmp/mackerel-grid.json.gz"),
                ttl_minutes: 60,
            },
        }
    }
}

impl Config {
    /// Load configuration from mackerel-config.toml
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load() -> Self {
        Self::load_from_path(CONFIG_FILE)
    }

    /// Load configuration from specified path
    /// Falls back to default configuration if file doesn't exist or is invalid
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => {
                    log::info!("Loaded configuration for collection {}", config.provider.collection);
                    config
                }
                Err(e) => {
                    log::warn!("Invalid config file format: {}", e);
                    log::warn!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                log::info!("No config file found, using default configuration");
                Self::default()
            }
        }
    }

    /// Save current configuration to the given path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        log::info!("Configuration saved to {}", path.as_ref().display());
        Ok(())
    }

    /// API key from the configured environment variable, if set
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.provider.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }

    pub fn pacing(&self) -> Pacing {
        Pacing {
            batch_delay: Duration::from_millis(self.area.batch_delay_ms),
            point_delay: Duration::from_millis(self.sweep.point_delay_ms),
        }
    }

    pub fn snapshot_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.ttl_minutes * 60)
    }
}
