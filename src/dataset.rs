// 🔗 Dataset Joiner - Transactions ⟕ Geo reference on origin country
//
// Left-outer: every transaction survives the join. Records whose origin has no
// GeoEntity keep empty geospatial fields.

use crate::geo_reference::{GeoPoint, GeoReference};
use crate::ledger::TransactionRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

// ============================================================================
// ENRICHED RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    #[serde(flatten)]
    pub transaction: TransactionRecord,
    pub origin_iso3: Option<String>,
    pub origin_point: Option<GeoPoint>,
}

impl EnrichedRecord {
    pub fn has_geo(&self) -> bool {
        self.origin_iso3.is_some()
    }
}

impl std::ops::Deref for EnrichedRecord {
    type Target = TransactionRecord;

    fn deref(&self) -> &TransactionRecord {
        &self.transaction
    }
}

// ============================================================================
// DATASET SUMMARY
// ============================================================================

/// Selector options and date bounds for the consuming UI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub record_count: usize,
    pub min_date: Option<NaiveDate>,
    pub max_date: Option<NaiveDate>,
    /// Origin countries in first-seen order
    pub countries: Vec<String>,
    /// Industries in first-seen order
    pub industries: Vec<String>,
}

impl DatasetSummary {
    pub fn from_records(records: &[EnrichedRecord]) -> Self {
        let mut countries = Vec::new();
        let mut industries = Vec::new();
        let mut seen_countries = HashSet::new();
        let mut seen_industries = HashSet::new();

        for record in records {
            if seen_countries.insert(record.origin_country.as_str()) {
                countries.push(record.origin_country.clone());
            }
            if seen_industries.insert(record.industry.as_str()) {
                industries.push(record.industry.clone());
            }
        }

        DatasetSummary {
            record_count: records.len(),
            min_date: records.iter().map(|r| r.date).min(),
            max_date: records.iter().map(|r| r.date).max(),
            countries,
            industries,
        }
    }

    /// Clamp a date into `[min_date, max_date]`. No-op on an empty dataset.
    pub fn clamp(&self, date: NaiveDate) -> NaiveDate {
        let mut date = date;
        if let Some(min) = self.min_date {
            date = date.max(min);
        }
        if let Some(max) = self.max_date {
            date = date.min(max);
        }
        date
    }

    /// Parse `YYYY-MM-DD` (an ISO timestamp prefix is accepted), clamping into range.
    /// Missing or unparsable input resolves to the minimum date.
    pub fn resolve_date(&self, raw: Option<&str>) -> Option<NaiveDate> {
        let parsed = raw
            .map(str::trim)
            .and_then(|s| s.get(..10).or(Some(s)))
            .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok());

        match parsed {
            Some(date) => Some(self.clamp(date)),
            None => self.min_date,
        }
    }
}

// ============================================================================
// DATASET
// ============================================================================

/// The joined, read-only base table plus its country → ISO3 dictionary
#[derive(Debug, Clone)]
pub struct Dataset {
    records: Vec<EnrichedRecord>,
    iso3_by_country: HashMap<String, String>,
    summary: DatasetSummary,
}

impl Dataset {
    /// Left-join transactions to the reference set on origin country name
    pub fn join(transactions: Vec<TransactionRecord>, geo: &GeoReference) -> Self {
        let mut unmatched = 0usize;

        let records: Vec<EnrichedRecord> = transactions
            .into_iter()
            .map(|transaction| {
                let entity = geo.get(&transaction.origin_country);
                if entity.is_none() {
                    unmatched += 1;
                }
                EnrichedRecord {
                    origin_iso3: entity.map(|e| e.iso3.clone()),
                    origin_point: entity.map(|e| e.representative_point),
                    transaction,
                }
            })
            .collect();

        if unmatched > 0 {
            tracing::warn!("{} transactions have no geo match for their origin country", unmatched);
        }

        let iso3_by_country = build_iso3_dictionary(&records);
        let summary = DatasetSummary::from_records(&records);

        tracing::info!(
            "Joined {} transactions ({} countries with ISO3)",
            records.len(),
            iso3_by_country.len()
        );

        Dataset {
            records,
            iso3_by_country,
            summary,
        }
    }

    pub fn records(&self) -> &[EnrichedRecord] {
        &self.records
    }

    pub fn summary(&self) -> &DatasetSummary {
        &self.summary
    }

    pub fn iso3_for(&self, country: &str) -> Option<&str> {
        self.iso3_by_country.get(country).map(String::as_str)
    }

    pub fn iso3_dictionary(&self) -> &HashMap<String, String> {
        &self.iso3_by_country
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Distinct (country, iso3) pairs; first occurrence in record order wins
fn build_iso3_dictionary(records: &[EnrichedRecord]) -> HashMap<String, String> {
    let mut dictionary = HashMap::new();

    for record in records {
        let Some(iso3) = &record.origin_iso3 else {
            continue;
        };
        if let Some(existing) = dictionary.get(&record.origin_country) {
            if existing != iso3 {
                tracing::warn!(
                    "Conflicting ISO3 for {}: keeping {}, ignoring {}",
                    record.origin_country,
                    existing,
                    iso3
                );
            }
            continue;
        }
        dictionary.insert(record.origin_country.clone(), iso3.clone());
    }

    dictionary
}

// ============================================================================
// TESTS
// ============================================================================
