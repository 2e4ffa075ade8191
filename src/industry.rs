// 🏭 Industry Aggregator - Legal vs illegal breakdown per industry for one country
//
// Raw mode: counts and summed amounts per industry per legality class.
// Normalized mode: each class divided by (legal + illegal) of that industry;
// industries with a zero denominator are left out of the normalized series.

use crate::dataset::EnrichedRecord;
use crate::ledger::MoneySource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// OUTPUT TYPES
// ============================================================================

/// Legal/illegal pair for one industry (raw values or shares)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustrySplit {
    pub industry: String,
    pub legal: f64,
    pub illegal: f64,
}

impl IndustrySplit {
    pub fn total(&self) -> f64 {
        self.legal + self.illegal
    }

    /// Shares of the total; None when the total is zero
    fn normalized(&self) -> Option<IndustrySplit> {
        let total = self.total();
        if total == 0.0 {
            return None;
        }
        Some(IndustrySplit {
            industry: self.industry.clone(),
            legal: self.legal / total,
            illegal: self.illegal / total,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryBreakdown {
    pub country: String,
    pub normalized: bool,
    /// Transaction counts (or count shares), ascending by total amount
    pub counts: Vec<IndustrySplit>,
    /// Summed amounts (or amount shares), ascending by total amount
    pub amounts: Vec<IndustrySplit>,
}

impl IndustryBreakdown {
    pub fn industries(&self) -> Vec<&str> {
        self.amounts.iter().map(|s| s.industry.as_str()).collect()
    }
}

#[derive(Default)]
struct Tally {
    legal_count: usize,
    illegal_count: usize,
    legal_amount: f64,
    illegal_amount: f64,
}

impl Tally {
    fn add(&mut self, source: MoneySource, amount: f64) {
        match source {
            MoneySource::Legal => {
                self.legal_count += 1;
                self.legal_amount += amount;
            }
            MoneySource::Illegal => {
                self.illegal_count += 1;
                self.illegal_amount += amount;
            }
        }
    }

    fn total_amount(&self) -> f64 {
        self.legal_amount + self.illegal_amount
    }
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct IndustryAggregator;

impl IndustryAggregator {
    /// Breakdown of one origin country's transactions by industry
    pub fn aggregate(country: &str, normalize: bool, records: &[EnrichedRecord]) -> IndustryBreakdown {
        let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();

        for record in records.iter().filter(|r| r.origin_country == country) {
            tallies
                .entry(record.industry.as_str())
                .or_default()
                .add(record.source_of_money, record.amount);
        }

        let mut ordered: Vec<(&str, Tally)> = tallies.into_iter().collect();
        ordered.sort_by(|(a_name, a), (b_name, b)| {
            a.total_amount()
                .total_cmp(&b.total_amount())
                .then_with(|| a_name.cmp(b_name))
        });

        let counts: Vec<IndustrySplit> = ordered
            .iter()
            .map(|(industry, t)| IndustrySplit {
                industry: industry.to_string(),
                legal: t.legal_count as f64,
                illegal: t.illegal_count as f64,
            })
            .collect();

        let amounts: Vec<IndustrySplit> = ordered
            .iter()
            .map(|(industry, t)| IndustrySplit {
                industry: industry.to_string(),
                legal: t.legal_amount,
                illegal: t.illegal_amount,
            })
            .collect();

        let (counts, amounts) = if normalize {
            (
                counts.iter().filter_map(IndustrySplit::normalized).collect(),
                amounts.iter().filter_map(IndustrySplit::normalized).collect(),
            )
        } else {
            (counts, amounts)
        };

        IndustryBreakdown {
            country: country.to_string(),
            normalized: normalize,
            counts,
            amounts,
        }
    }

    /// Total amount per industry, ascending (ties by name): display ranking for industry cards
    pub fn ranking(records: &[EnrichedRecord]) -> Vec<(String, f64)> {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for record in records {
            *totals.entry(record.industry.as_str()).or_insert(0.0) += record.amount;
        }

        let mut ranking: Vec<(String, f64)> = totals
            .into_iter()
            .map(|(industry, total)| (industry.to_string(), total))
            .collect();
        ranking.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        ranking
    }
}

// ============================================================================
// TESTS
// ============================================================================
