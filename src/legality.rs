// ⚖️ Legality Aggregator - Illegal-ratio and transaction-type overlays per country
//
// illegal ratio = reported illegal / total illegal, over illegal-sourced
// transactions grouped by origin country.

use crate::dataset::EnrichedRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// SUMMARY TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CountryLegalitySummary {
    /// In [0, 1]; 0 when the country has no illegal transactions
    pub illegal_ratio: f64,
    pub illegal_count: usize,
    pub reported_count: usize,
    /// Total illegal amount (choropleth layer)
    pub illegal_amount: f64,
    /// Transaction type → count, illegal transactions only
    pub transaction_types: BTreeMap<String, usize>,
}

/// Per-country overlays keyed by display name. Only countries with at least
/// one illegal transaction have an entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LegalityReport {
    pub countries: BTreeMap<String, CountryLegalitySummary>,
}

impl LegalityReport {
    /// 0 for countries without illegal transactions
    pub fn ratio_for(&self, country: &str) -> f64 {
        self.countries
            .get(country)
            .map(|s| s.illegal_ratio)
            .unwrap_or(0.0)
    }

    /// Empty histogram for countries without illegal transactions
    pub fn histogram_for(&self, country: &str) -> BTreeMap<String, usize> {
        self.countries
            .get(country)
            .map(|s| s.transaction_types.clone())
            .unwrap_or_default()
    }

    pub fn ratios(&self) -> BTreeMap<String, f64> {
        self.countries
            .iter()
            .map(|(country, s)| (country.clone(), s.illegal_ratio))
            .collect()
    }

    pub fn illegal_amounts(&self) -> BTreeMap<String, f64> {
        self.countries
            .iter()
            .map(|(country, s)| (country.clone(), s.illegal_amount))
            .collect()
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct LegalityAggregator;

impl LegalityAggregator {
    pub fn aggregate(records: &[EnrichedRecord]) -> LegalityReport {
        let mut countries: BTreeMap<String, CountryLegalitySummary> = BTreeMap::new();

        for record in records.iter().filter(|r| r.is_illegal()) {
            let summary = countries.entry(record.origin_country.clone()).or_default();
            summary.illegal_count += 1;
            summary.illegal_amount += record.amount;
            if record.reported_by_authority {
                summary.reported_count += 1;
            }
            *summary
                .transaction_types
                .entry(record.transaction_type.clone())
                .or_insert(0) += 1;
        }

        for summary in countries.values_mut() {
            summary.illegal_ratio = if summary.illegal_count > 0 {
                summary.reported_count as f64 / summary.illegal_count as f64
            } else {
                0.0
            };
        }

        tracing::debug!("Legality overlay for {} countries", countries.len());

        LegalityReport { countries }
    }
}

// ============================================================================
// TESTS
// ============================================================================
