// 📈 Time Series Aggregator
// Three views over one slice (selected industries × selected origin countries):
//   1. amount over time per country, smoothed by a trailing moving average
//   2. outbound totals per (origin, destination)
//   3. spend vs receive per country on a single date

use crate::dataset::EnrichedRecord;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

// ============================================================================
// QUERY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesQuery {
    /// None selects every industry; an empty list selects none
    pub industries: Option<Vec<String>>,
    /// Origin countries; None selects every country, an empty list selects none
    pub countries: Option<Vec<String>>,
    /// Moving-average window in periods (values below 1 behave as 1)
    pub window: usize,
    /// Snapshot date for the spend/receive view
    pub date: NaiveDate,
}

// ============================================================================
// OUTPUT TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    /// Summed amount on this date
    pub amount: f64,
    /// Trailing moving average ending on this date
    pub smoothed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationTotal {
    pub origin: String,
    pub destination: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpendReceive {
    pub country: String,
    pub spend: f64,
    pub receive: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesReport {
    /// Origin country → date-ordered series
    pub amount_over_time: BTreeMap<String, Vec<SeriesPoint>>,
    /// Ordered by origin, then destination
    pub destination_totals: Vec<DestinationTotal>,
    pub snapshot_date: NaiveDate,
    /// Ordered by country name
    pub spend_vs_receive: Vec<SpendReceive>,
}

// ============================================================================
// AGGREGATOR
// ============================================================================

pub struct TimeSeriesAggregator;

impl TimeSeriesAggregator {
    pub fn aggregate(query: &TimeSeriesQuery, records: &[EnrichedRecord]) -> TimeSeriesReport {
        let industries = selection(query.industries.as_deref());
        let countries = selection(query.countries.as_deref());

        let slice: Vec<&EnrichedRecord> = records
            .iter()
            .filter(|r| industries.as_ref().map_or(true, |s| s.contains(r.industry.as_str())))
            .filter(|r| countries.as_ref().map_or(true, |s| s.contains(r.origin_country.as_str())))
            .collect();

        tracing::debug!(
            "Time series slice: {} of {} records, window {}",
            slice.len(),
            records.len(),
            query.window
        );

        TimeSeriesReport {
            amount_over_time: amount_over_time(&slice, query.window),
            destination_totals: destination_totals(&slice),
            snapshot_date: query.date,
            spend_vs_receive: spend_vs_receive(&slice, query.date),
        }
    }
}

fn selection(values: Option<&[String]>) -> Option<HashSet<&str>> {
    values.map(|v| v.iter().map(String::as_str).collect())
}

fn amount_over_time(slice: &[&EnrichedRecord], window: usize) -> BTreeMap<String, Vec<SeriesPoint>> {
    let mut by_country: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for record in slice {
        *by_country
            .entry(record.origin_country.as_str())
            .or_default()
            .entry(record.date)
            .or_insert(0.0) += record.amount;
    }

    by_country
        .into_iter()
        .map(|(country, by_date)| {
            let amounts: Vec<f64> = by_date.values().copied().collect();
            let smoothed = rolling_mean(&amounts, window);

            let points = by_date
                .into_iter()
                .zip(smoothed)
                .map(|((date, amount), smoothed)| SeriesPoint { date, amount, smoothed })
                .collect();

            (country.to_string(), points)
        })
        .collect()
}

fn destination_totals(slice: &[&EnrichedRecord]) -> Vec<DestinationTotal> {
    let mut totals: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for record in slice {
        *totals
            .entry((record.origin_country.as_str(), record.destination_country.as_str()))
            .or_insert(0.0) += record.amount;
    }

    totals
        .into_iter()
        .map(|((origin, destination), amount)| DestinationTotal {
            origin: origin.to_string(),
            destination: destination.to_string(),
            amount,
        })
        .collect()
}

/// Every country seen as origin or destination anywhere in the slice gets a row;
/// a missing side on `date` is 0.
fn spend_vs_receive(slice: &[&EnrichedRecord], date: NaiveDate) -> Vec<SpendReceive> {
    let mut countries: BTreeSet<&str> = BTreeSet::new();
    for record in slice {
        countries.insert(record.origin_country.as_str());
        countries.insert(record.destination_country.as_str());
    }

    let mut spend: BTreeMap<&str, f64> = BTreeMap::new();
    let mut receive: BTreeMap<&str, f64> = BTreeMap::new();
    for record in slice.iter().filter(|r| r.date == date) {
        *spend.entry(record.origin_country.as_str()).or_insert(0.0) += record.amount;
        *receive.entry(record.destination_country.as_str()).or_insert(0.0) += record.amount;
    }

    countries
        .into_iter()
        .map(|country| SpendReceive {
            country: country.to_string(),
            spend: spend.get(country).copied().unwrap_or(0.0),
            receive: receive.get(country).copied().unwrap_or(0.0),
        })
        .collect()
}

/// Trailing mean over up to `window` values; the first points use a shrinking window
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;

    for (i, value) in values.iter().enumerate() {
        sum += value;
        if i >= window {
            sum -= values[i - window];
        }
        let len = (i + 1).min(window);
        out.push(sum / len as f64);
    }

    out
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{create_test_record, create_test_reference};
    use crate::dataset::Dataset;
    use crate::ledger::MoneySource;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dataset() -> Dataset {
        let records = vec![
            create_test_record("USA", "UK", "2024-01-01", 100.0, "Finance", MoneySource::Legal, "Stocks Transfer", false),
            create_test_record("USA", "UK", "2024-01-01", 50.0, "Finance", MoneySource::Illegal, "Offshore Transfer", true),
            create_test_record("USA", "South Africa", "2024-01-02", 300.0, "Casinos", MoneySource::Illegal, "Cryptocurrency", false),
            create_test_record("USA", "UK", "2024-01-03", 600.0, "Finance", MoneySource::Legal, "Stocks Transfer", false),
            create_test_record("UK", "USA", "2024-01-01", 40.0, "Finance", MoneySource::Legal, "Stocks Transfer", false),
            create_test_record("UK", "Singapore", "2024-01-02", 70.0, "Real Estate", MoneySource::Legal, "Property Purchase", false),
        ];
        Dataset::join(records, &create_test_reference())
    }

    fn query(window: usize, date: &str) -> TimeSeriesQuery {
        TimeSeriesQuery {
            industries: None,
            countries: None,
            window,
            date: day(date),
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_rolling_mean_window_one_is_identity() {
        let values = vec![3.0, 1.0, 4.0, 1.0, 5.0];
        assert_eq!(rolling_mean(&values, 1), values);
        assert_eq!(rolling_mean(&values, 0), values);
    }

    #[test]
    fn test_rolling_mean_shrinking_start() {
        let smoothed = rolling_mean(&[2.0, 4.0, 6.0, 8.0], 2);
        assert_eq!(smoothed, vec![2.0, 3.0, 5.0, 7.0]);
    }

    #[test]
    fn test_rolling_mean_large_window_is_cumulative() {
        let values = [2.0, 4.0, 9.0];
        let smoothed = rolling_mean(&values, 10);

        assert_close(smoothed[0], 2.0);
        assert_close(smoothed[1], 3.0);
        assert_close(smoothed[2], 5.0);
    }

    #[test]
    fn test_rolling_mean_empty() {
        assert!(rolling_mean(&[], 3).is_empty());
    }

    #[test]
    fn test_amount_over_time_groups_by_date() {
        let data = dataset();
        let report = TimeSeriesAggregator::aggregate(&query(1, "2024-01-01"), data.records());

        let usa = &report.amount_over_time["USA"];
        assert_eq!(usa.len(), 3);
        assert_eq!(usa[0].date, day("2024-01-01"));
        assert_eq!(usa[0].amount, 150.0);
        assert_eq!(usa[0].smoothed, 150.0);
        assert_eq!(usa[2].amount, 600.0);
    }

    #[test]
    fn test_amount_over_time_smoothing_final_mean() {
        let data = dataset();
        let report = TimeSeriesAggregator::aggregate(&query(3, "2024-01-01"), data.records());

        let usa = &report.amount_over_time["USA"];
        assert_close(usa[2].smoothed, (150.0 + 300.0 + 600.0) / 3.0);
        assert_close(usa[1].smoothed, (150.0 + 300.0) / 2.0);
    }

    #[test]
    fn test_destination_totals() {
        let data = dataset();
        let report = TimeSeriesAggregator::aggregate(&query(1, "2024-01-01"), data.records());

        let usa_uk = report
            .destination_totals
            .iter()
            .find(|t| t.origin == "USA" && t.destination == "UK")
            .unwrap();
        assert_eq!(usa_uk.amount, 750.0);
        assert_eq!(report.destination_totals.len(), 4);
        assert_eq!(report.destination_totals[0].origin, "UK");
    }

    #[test]
    fn test_industry_and_country_selection() {
        let data = dataset();
        let q = TimeSeriesQuery {
            industries: Some(vec!["Finance".to_string()]),
            countries: Some(vec!["USA".to_string()]),
            window: 1,
            date: day("2024-01-01"),
        };

        let report = TimeSeriesAggregator::aggregate(&q, data.records());

        assert_eq!(report.amount_over_time.len(), 1);
        assert_eq!(report.amount_over_time["USA"].len(), 2);
        assert_eq!(report.destination_totals.len(), 1);
    }

    #[test]
    fn test_empty_selection_matches_nothing() {
        let data = dataset();
        let q = TimeSeriesQuery {
            industries: Some(Vec::new()),
            countries: Some(vec!["USA".to_string()]),
            window: 1,
            date: day("2024-01-01"),
        };

        let report = TimeSeriesAggregator::aggregate(&q, data.records());

        assert!(report.amount_over_time.is_empty());
        assert!(report.destination_totals.is_empty());
        assert!(report.spend_vs_receive.is_empty());

        let q = TimeSeriesQuery {
            industries: None,
            countries: Some(Vec::new()),
            ..q
        };
        let report = TimeSeriesAggregator::aggregate(&q, data.records());
        assert!(report.amount_over_time.is_empty());
    }

    #[test]
    fn test_spend_vs_receive_outer_join() {
        let data = dataset();
        let report = TimeSeriesAggregator::aggregate(&query(1, "2024-01-02"), data.records());

        let row = |c: &str| report.spend_vs_receive.iter().find(|r| r.country == c).cloned().unwrap();

        // Singapore only ever appears as a destination
        let sgp = row("Singapore");
        assert_eq!((sgp.spend, sgp.receive), (0.0, 70.0));

        let usa = row("USA");
        assert_eq!((usa.spend, usa.receive), (300.0, 0.0));

        let zaf = row("South Africa");
        assert_eq!((zaf.spend, zaf.receive), (0.0, 300.0));

        // UK and USA traded on other dates: still present
        assert_eq!(report.spend_vs_receive.len(), 4);
    }

    #[test]
    fn test_spend_vs_receive_date_without_activity() {
        let data = dataset();
        let report = TimeSeriesAggregator::aggregate(&query(1, "2030-01-01"), data.records());

        assert_eq!(report.spend_vs_receive.len(), 4);
        assert!(report
            .spend_vs_receive
            .iter()
            .all(|r| r.spend == 0.0 && r.receive == 0.0));
    }
}
