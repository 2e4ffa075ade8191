// 🌍 Geo Reference - Country boundaries + representative points
// One GeoEntity per recognized country name. Boundary admin names are normalized
// through the configured mapping table; unmapped features are dropped, not errors.

use crate::config::PipelineConfig;
use crate::geocoder::Geocoder;
use anyhow::{anyhow, Context, Result};
use geo::{InteriorPoint, MultiPolygon};
use geojson::{Feature, GeoJson, JsonObject};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

// ============================================================================
// GEO POINT
// ============================================================================

/// Latitude/longitude anchor (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPoint { lat, lon }
    }
}

// ============================================================================
// GEO ENTITY
// ============================================================================

/// A recognized country with its boundary and representative point
#[derive(Debug, Clone)]
pub struct GeoEntity {
    /// Dataset display name (join key)
    pub name: String,
    pub iso3: String,
    pub boundary: MultiPolygon<f64>,
    /// Guaranteed to lie inside `boundary`
    pub representative_point: GeoPoint,
}

impl GeoEntity {
    /// Build an entity, computing its representative point once.
    /// Fails when the boundary is empty.
    pub fn new(name: String, iso3: String, boundary: MultiPolygon<f64>) -> Result<Self> {
        let point = boundary
            .interior_point()
            .ok_or_else(|| anyhow!("Empty boundary for {}", name))?;

        Ok(GeoEntity {
            name,
            iso3,
            representative_point: GeoPoint::new(point.y(), point.x()),
            boundary,
        })
    }
}

// ============================================================================
// GEO REFERENCE (registry)
// ============================================================================

/// Reference set keyed by display name, insertion-ordered
#[derive(Debug, Clone, Default)]
pub struct GeoReference {
    entities: Vec<GeoEntity>,
    by_name: HashMap<String, usize>,
}

impl GeoReference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entity. A same-named entity is replaced, keeping one per name.
    pub fn insert(&mut self, entity: GeoEntity) {
        match self.by_name.get(&entity.name) {
            Some(&idx) => {
                tracing::warn!("Replacing boundary for {} ({})", entity.name, entity.iso3);
                self.entities[idx] = entity;
            }
            None => {
                self.by_name.insert(entity.name.clone(), self.entities.len());
                self.entities.push(entity);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&GeoEntity> {
        self.by_name.get(name).map(|&idx| &self.entities[idx])
    }

    pub fn by_iso3(&self, iso3: &str) -> Option<&GeoEntity> {
        self.entities.iter().find(|e| e.iso3 == iso3)
    }

    pub fn iso3_for(&self, name: &str) -> Option<&str> {
        self.get(name).map(|e| e.iso3.as_str())
    }

    pub fn point_for(&self, name: &str) -> Option<GeoPoint> {
        self.get(name).map(|e| e.representative_point)
    }

    /// ISO3 → display name, for labeling map layers
    pub fn names_by_iso3(&self) -> BTreeMap<String, String> {
        self.entities
            .iter()
            .map(|e| (e.iso3.clone(), e.name.clone()))
            .collect()
    }

    pub fn iso3_codes(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.iso3.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeoEntity> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // ========================================================================
    // LOADING
    // ========================================================================

    /// Load the full reference set: boundary file + geocoded entities.
    /// Any I/O or geocoder failure aborts the load.
    pub fn load(config: &PipelineConfig, geocoder: &dyn Geocoder) -> Result<Self> {
        let mut reference = Self::from_boundary_file(&config.boundaries_path, &config.countries)?;

        for geocoded in &config.geocoded {
            let boundary = geocoder
                .boundary(&geocoded.query)
                .with_context(|| format!("Geocoding failed for {:?}", geocoded.query))?;

            let entity = GeoEntity::new(geocoded.name.clone(), geocoded.iso3.clone(), boundary)?;
            tracing::info!(
                "Geocoded {} ({}) at {:.4},{:.4}",
                entity.name,
                entity.iso3,
                entity.representative_point.lat,
                entity.representative_point.lon
            );
            reference.insert(entity);
        }

        // Configured names that ended up with no boundary at all
        for name in config.countries.values() {
            if reference.get(name).is_none() {
                tracing::warn!("No boundary found for configured country {}", name);
            }
        }

        tracing::info!("Geo reference ready: {} countries", reference.len());
        Ok(reference)
    }

    /// Load named boundaries from a GeoJSON file
    pub fn from_boundary_file(path: &Path, mapping: &BTreeMap<String, String>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read boundary file: {}", path.display()))?;

        Self::from_geojson_str(&content, mapping)
            .with_context(|| format!("Failed to load boundaries from {}", path.display()))
    }

    /// Parse a FeatureCollection, keeping only features whose `admin` name is mapped
    pub fn from_geojson_str(content: &str, mapping: &BTreeMap<String, String>) -> Result<Self> {
        let geojson: GeoJson = content.parse().context("Invalid GeoJSON")?;

        let mut reference = GeoReference::new();

        for feature in features_of(geojson) {
            let Some(admin) = property_str(&feature.properties, "admin") else {
                tracing::debug!("Skipping feature without admin name");
                continue;
            };

            let Some(name) = mapping.get(&admin) else {
                continue;
            };

            let Some(iso3) = iso3_of(&feature.properties) else {
                tracing::warn!("Dropping {}: no ISO3 code", admin);
                continue;
            };

            let Some(geometry) = feature.geometry else {
                tracing::warn!("Dropping {}: feature has no geometry", admin);
                continue;
            };

            let boundary = match to_multipolygon(geometry) {
                Ok(boundary) => boundary,
                Err(e) => {
                    tracing::warn!("Dropping {}: {}", admin, e);
                    continue;
                }
            };

            match GeoEntity::new(name.clone(), iso3, boundary) {
                Ok(entity) => reference.insert(entity),
                Err(e) => tracing::warn!("Dropping {}: {}", admin, e),
            }
        }

        Ok(reference)
    }
}

// ============================================================================
// GEOJSON HELPERS
// ============================================================================

pub(crate) fn features_of(geojson: GeoJson) -> Vec<Feature> {
    match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(g) => vec![Feature {
            bbox: None,
            geometry: Some(g),
            id: None,
            properties: None,
            foreign_members: None,
        }],
    }
}

/// Convert a Polygon/MultiPolygon GeoJSON geometry into a MultiPolygon
pub(crate) fn to_multipolygon(geometry: geojson::Geometry) -> Result<MultiPolygon<f64>> {
    let geometry: geo::Geometry<f64> = geometry
        .try_into()
        .map_err(|e| anyhow!("Unsupported geometry: {}", e))?;

    match geometry {
        geo::Geometry::Polygon(polygon) => Ok(MultiPolygon::new(vec![polygon])),
        geo::Geometry::MultiPolygon(multi) => Ok(multi),
        _ => Err(anyhow!("Boundary must be a Polygon or MultiPolygon")),
    }
}

fn property_str(properties: &Option<JsonObject>, key: &str) -> Option<String> {
    properties
        .as_ref()
        .and_then(|props| props.get(key))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// `iso_a3`, falling back to `adm0_a3` when missing or the Natural Earth "-99" placeholder
fn iso3_of(properties: &Option<JsonObject>) -> Option<String> {
    property_str(properties, "iso_a3")
        .filter(|code| code != "-99")
        .or_else(|| property_str(properties, "adm0_a3").filter(|code| code != "-99"))
}

// ============================================================================
// TESTS
// ============================================================================
