// 📍 Geocoder - Boundary lookup for countries missing from the boundary file
//
// Only used during startup load. Failures are bounded by `max_attempts` and then
// surface as errors: the pipeline never starts with a partial reference set.

use crate::config::GeocoderConfig;
use crate::geo_reference::{features_of, to_multipolygon};
use anyhow::{anyhow, Context, Result};
use geo::MultiPolygon;
use geojson::GeoJson;
use std::collections::HashMap;
use std::time::Duration;

/// Resolves a free-form place query to a boundary polygon
pub trait Geocoder {
    fn boundary(&self, query: &str) -> Result<MultiPolygon<f64>>;
}

// ============================================================================
// NOMINATIM
// ============================================================================

/// Nominatim search API (`format=geojson&polygon_geojson=1`)
pub struct NominatimGeocoder {
    endpoint: String,
    max_attempts: u32,
    client: reqwest::blocking::Client,
}

impl NominatimGeocoder {
    pub fn new(config: &GeocoderConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build geocoder HTTP client")?;

        Ok(NominatimGeocoder {
            endpoint: config.endpoint.clone(),
            max_attempts: config.max_attempts.max(1),
            client,
        })
    }

    fn fetch(&self, query: &str) -> Result<MultiPolygon<f64>> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "geojson"),
                ("polygon_geojson", "1"),
                ("limit", "1"),
            ])
            .send()
            .with_context(|| format!("Geocoder unreachable at {}", self.endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("Geocoder returned HTTP {}", status));
        }

        let body = response.text().context("Failed to read geocoder response")?;
        parse_boundary_response(&body)
    }
}

impl Geocoder for NominatimGeocoder {
    fn boundary(&self, query: &str) -> Result<MultiPolygon<f64>> {
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            match self.fetch(query) {
                Ok(boundary) => return Ok(boundary),
                Err(e) => {
                    tracing::warn!(
                        "Geocoder attempt {}/{} for {:?} failed: {:#}",
                        attempt,
                        self.max_attempts,
                        query,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.max_attempts {
                        std::thread::sleep(Duration::from_millis(500 * attempt as u64));
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("Geocoder made no attempts")))
    }
}

/// First Polygon/MultiPolygon feature of a geocoder GeoJSON response
pub fn parse_boundary_response(body: &str) -> Result<MultiPolygon<f64>> {
    let geojson: GeoJson = body.parse().context("Geocoder response is not GeoJSON")?;

    features_of(geojson)
        .into_iter()
        .filter_map(|feature| feature.geometry)
        .find_map(|geometry| to_multipolygon(geometry).ok())
        .ok_or_else(|| anyhow!("Geocoder response has no boundary polygon"))
}

// ============================================================================
// STATIC (in-memory)
// ============================================================================

/// Fixed query → boundary table. Unknown queries fail.
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    boundaries: HashMap<String, MultiPolygon<f64>>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, query: &str, boundary: MultiPolygon<f64>) -> Self {
        self.boundaries.insert(query.to_string(), boundary);
        self
    }
}

impl Geocoder for StaticGeocoder {
    fn boundary(&self, query: &str) -> Result<MultiPolygon<f64>> {
        self.boundaries
            .get(query)
            .cloned()
            .ok_or_else(|| anyhow!("No boundary known for {:?}", query))
    }
}

// ============================================================================
// TESTS
// ============================================================================
