// ⚙️ Pipeline Configuration - Tables as data
// Input paths, country-name mapping, geocoded entities, geocoder policy and palette.

use crate::palette::Palette;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable pointing binaries at a config file
pub const CONFIG_ENV: &str = "FLOW_ATLAS_CONFIG";

// ============================================================================
// GEOCODER SETTINGS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocoderConfig {
    /// Search endpoint (Nominatim-compatible)
    pub endpoint: String,

    /// Nominatim rejects requests without a User-Agent
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts before startup fails (minimum 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        GeocoderConfig {
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            user_agent: format!("flow-atlas/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: default_timeout_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// A country whose boundary comes from the geocoder instead of the boundary file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedCountry {
    /// Dataset display name
    pub name: String,
    pub iso3: String,
    /// Free-form geocoder query
    pub query: String,
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub transactions_path: PathBuf,
    pub boundaries_path: PathBuf,

    /// Boundary admin name → dataset display name.
    /// Admin names missing from this table are dropped from the reference set.
    pub countries: BTreeMap<String, String>,

    #[serde(default)]
    pub geocoded: Vec<GeocodedCountry>,

    #[serde(default)]
    pub geocoder: GeocoderConfig,

    #[serde(default)]
    pub palette: Palette,
}

impl PipelineConfig {
    /// Load config from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: PipelineConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }

    /// Config from `FLOW_ATLAS_CONFIG` if set, built-in defaults otherwise
    pub fn from_env() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Dataset display name for a boundary admin name
    pub fn display_name(&self, admin: &str) -> Option<&str> {
        self.countries.get(admin).map(String::as_str)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let countries = [
            ("Brazil", "Brazil"),
            ("China", "China"),
            ("India", "India"),
            ("Russia", "Russia"),
            ("Singapore", "Singapore"),
            ("South Africa", "South Africa"),
            ("Switzerland", "Switzerland"),
            ("United Arab Emirates", "UAE"),
            ("United Kingdom", "UK"),
            ("United States of America", "USA"),
        ]
        .iter()
        .map(|(admin, name)| (admin.to_string(), name.to_string()))
        .collect();

        PipelineConfig {
            transactions_path: PathBuf::from("data/transactions.csv"),
            boundaries_path: PathBuf::from("data/custom.geo.json"),
            countries,
            geocoded: vec![GeocodedCountry {
                name: "Singapore".to_string(),
                iso3: "SGP".to_string(),
                query: "Singapore".to_string(),
            }],
            geocoder: GeocoderConfig::default(),
            palette: Palette::default(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
