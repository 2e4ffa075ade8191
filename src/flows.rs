// 🧭 Flow Table + Flow Filter
//
// FlowTable: one directed flow per (de-duplicated) transaction, with origin and
// destination resolved against the same geo reference.
// FlowFilter: date/country/direction slice of the flow table plus the per-ISO3
// net-amount series used to shade the map.

use crate::dataset::Dataset;
use crate::geo_reference::{GeoPoint, GeoReference};
use crate::palette::ColorScale;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashSet};

// ============================================================================
// FLOW RECORD
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub origin_country: String,
    pub origin_iso3: Option<String>,
    pub origin_point: Option<GeoPoint>,
    pub destination_country: String,
    pub destination_iso3: Option<String>,
    pub destination_point: Option<GeoPoint>,
    pub amount: f64,
    pub date: NaiveDate,
}

impl FlowRecord {
    /// Both endpoints resolved: the flow can be drawn as an arrow
    pub fn is_routable(&self) -> bool {
        self.origin_point.is_some() && self.destination_point.is_some()
    }

    /// Natural key: (origin ISO3, origin point, destination country, amount, date)
    pub fn dedup_key(&self) -> String {
        let point = self
            .origin_point
            .map(|p| format!("{},{}", p.lat, p.lon))
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(format!(
            "{}|{}|{}|{}|{}",
            self.origin_iso3.as_deref().unwrap_or(""),
            point,
            self.destination_country,
            self.amount,
            self.date
        ));
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// FLOW TABLE
// ============================================================================

/// Read-only flow table derived once from the joined dataset
#[derive(Debug, Clone, Default)]
pub struct FlowTable {
    flows: Vec<FlowRecord>,
}

impl FlowTable {
    /// Build flows from the dataset, dropping rows identical under the natural key.
    /// First occurrence in record order is kept.
    pub fn compute(dataset: &Dataset, geo: &GeoReference) -> Self {
        let mut seen = HashSet::new();
        let mut flows = Vec::with_capacity(dataset.len());
        let mut unresolved = 0usize;

        for record in dataset.records() {
            let destination = geo.get(&record.destination_country);
            if destination.is_none() {
                unresolved += 1;
            }

            let flow = FlowRecord {
                origin_country: record.origin_country.clone(),
                origin_iso3: record.origin_iso3.clone(),
                origin_point: record.origin_point,
                destination_country: record.destination_country.clone(),
                destination_iso3: destination.map(|e| e.iso3.clone()),
                destination_point: destination.map(|e| e.representative_point),
                amount: record.amount,
                date: record.date,
            };

            if seen.insert(flow.dedup_key()) {
                flows.push(flow);
            }
        }

        if unresolved > 0 {
            tracing::warn!("{} transactions have an unrecognized destination country", unresolved);
        }
        tracing::info!(
            "Computed {} flows from {} transactions ({} duplicates dropped)",
            flows.len(),
            dataset.len(),
            dataset.len() - flows.len()
        );

        FlowTable { flows }
    }

    pub fn flows(&self) -> &[FlowRecord] {
        &self.flows
    }

    pub fn on_date(&self, date: NaiveDate) -> impl Iterator<Item = &FlowRecord> {
        self.flows.iter().filter(move |f| f.date == date)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

// ============================================================================
// FILTER PARAMETERS
// ============================================================================

/// Which side(s) of a flow the selected country must be on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirectionFlags {
    pub origin: bool,
    pub destination: bool,
}

impl DirectionFlags {
    pub const BOTH: DirectionFlags = DirectionFlags { origin: true, destination: true };
    pub const ORIGIN: DirectionFlags = DirectionFlags { origin: true, destination: false };
    pub const DESTINATION: DirectionFlags = DirectionFlags { origin: false, destination: true };
    pub const NONE: DirectionFlags = DirectionFlags { origin: false, destination: false };

    /// From checklist values; "destiny" is accepted for "destination"
    pub fn from_options<S: AsRef<str>>(options: &[S]) -> Self {
        let mut flags = DirectionFlags::NONE;
        for option in options {
            match option.as_ref().trim().to_lowercase().as_str() {
                "origin" => flags.origin = true,
                "destination" | "destiny" => flags.destination = true,
                _ => {}
            }
        }
        flags
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountrySelector {
    All,
    Country(String),
}

impl CountrySelector {
    /// "ALL" (any case) or an empty value selects every country
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case("all") {
            CountrySelector::All
        } else {
            CountrySelector::Country(raw.to_string())
        }
    }
}

// ============================================================================
// NET FLOW SERIES
// ============================================================================

/// Signed net amount per ISO3 plus its extrema. Countries with no data have no entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetFlowSeries {
    pub values: BTreeMap<String, f64>,
    /// 0 when the series is empty
    pub min: f64,
    pub max: f64,
}

impl NetFlowSeries {
    pub fn from_values(values: BTreeMap<String, f64>) -> Self {
        if values.is_empty() {
            return NetFlowSeries::default();
        }

        let min = values.values().copied().fold(f64::INFINITY, f64::min);
        let max = values.values().copied().fold(f64::NEG_INFINITY, f64::max);

        NetFlowSeries { values, min, max }
    }

    pub fn get(&self, iso3: &str) -> Option<f64> {
        self.values.get(iso3).copied()
    }

    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// ISO3 → fill color on the linear scale between `min` and `max`
    pub fn shade(&self, scale: &ColorScale) -> BTreeMap<String, String> {
        self.values
            .iter()
            .map(|(iso3, amount)| {
                (iso3.clone(), scale.color_for(*amount, self.min, self.max).to_string())
            })
            .collect()
    }
}

/// Sum of amounts per ISO3, `sign` applied; flows with an unresolved side are skipped
fn sum_by<'a, F>(flows: &[&'a FlowRecord], key: F, sign: f64, into: &mut BTreeMap<String, f64>)
where
    F: Fn(&'a FlowRecord) -> Option<&'a str>,
{
    for flow in flows.iter().copied() {
        if let Some(iso3) = key(flow) {
            *into.entry(iso3.to_string()).or_insert(0.0) += sign * flow.amount;
        }
    }
}

// ============================================================================
// FLOW VIEW (filter output)
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowView {
    /// Routable flows of the slice (both endpoints resolved)
    pub flows: Vec<FlowRecord>,
    pub net: NetFlowSeries,
    pub show_arrows: bool,
    /// The (clamped) date actually used; None only for an empty dataset
    pub date: Option<NaiveDate>,
}

// ============================================================================
// FLOW FILTER
// ============================================================================

pub struct FlowFilter<'a> {
    dataset: &'a Dataset,
    table: &'a FlowTable,
    geo: &'a GeoReference,
}

impl<'a> FlowFilter<'a> {
    pub fn new(dataset: &'a Dataset, table: &'a FlowTable, geo: &'a GeoReference) -> Self {
        FlowFilter { dataset, table, geo }
    }

    /// ISO3 for a selected country: join dictionary first, reference set second
    fn resolve_iso3(&self, country: &str) -> Option<&'a str> {
        self.dataset
            .iso3_for(country)
            .or_else(|| self.geo.iso3_for(country))
    }

    /// Slice flows by exact (clamped) date, country and direction and compute the net series.
    /// A missing date resolves to the dataset's first date.
    pub fn filter(
        &self,
        directions: DirectionFlags,
        country: &CountrySelector,
        date: Option<NaiveDate>,
    ) -> FlowView {
        let summary = self.dataset.summary();
        let date = match date {
            Some(d) => Some(summary.clamp(d)),
            None => summary.min_date,
        };

        let Some(day) = date else {
            return FlowView {
                flows: Vec::new(),
                net: NetFlowSeries::default(),
                show_arrows: directions != DirectionFlags::NONE,
                date: None,
            };
        };

        let on_date: Vec<&FlowRecord> = self.table.on_date(day).collect();

        let subset: Vec<&FlowRecord> = match country {
            CountrySelector::All => on_date,
            CountrySelector::Country(name) => match self.resolve_iso3(name) {
                Some(iso3) => {
                    let is_origin = |f: &FlowRecord| f.origin_iso3.as_deref() == Some(iso3);
                    let is_destination = |f: &FlowRecord| f.destination_iso3.as_deref() == Some(iso3);

                    on_date
                        .into_iter()
                        .filter(|f| match (directions.origin, directions.destination) {
                            (true, false) => is_origin(*f),
                            (false, true) => is_destination(*f),
                            _ => is_origin(*f) || is_destination(*f),
                        })
                        .collect()
                }
                None => {
                    tracing::debug!("Country {:?} has no ISO3; empty flow slice", name);
                    Vec::new()
                }
            },
        };

        let mut values = BTreeMap::new();
        let mut show_arrows = true;

        match (directions.origin, directions.destination) {
            (true, true) => {
                sum_by(&subset, |f| f.destination_iso3.as_deref(), 1.0, &mut values);
                sum_by(&subset, |f| f.origin_iso3.as_deref(), -1.0, &mut values);
            }
            (true, false) => sum_by(&subset, |f| f.origin_iso3.as_deref(), -1.0, &mut values),
            (false, true) => sum_by(&subset, |f| f.destination_iso3.as_deref(), 1.0, &mut values),
            (false, false) => {
                values = self.geo.iso3_codes().map(|iso3| (iso3.to_string(), 0.0)).collect();
                show_arrows = false;
            }
        }

        tracing::debug!(
            "Flow filter {} {:?} {:?}: {} flows, {} countries",
            day,
            directions,
            country,
            subset.len(),
            values.len()
        );

        FlowView {
            flows: subset.into_iter().filter(|f| f.is_routable()).cloned().collect(),
            net: NetFlowSeries::from_values(values),
            show_arrows,
            date: Some(day),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{create_round_trip_records, create_test_record, create_test_reference};
    use crate::ledger::MoneySource;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn build(records: Vec<crate::ledger::TransactionRecord>) -> (Dataset, FlowTable, GeoReference) {
        let geo = create_test_reference();
        let dataset = Dataset::join(records, &geo);
        let table = FlowTable::compute(&dataset, &geo);
        (dataset, table, geo)
    }

    fn mixed_records() -> Vec<crate::ledger::TransactionRecord> {
        let mut records = create_round_trip_records();
        records.push(create_test_record("South Africa", "USA", "2024-01-01", 300.0, "Construction", MoneySource::Legal, "Cash Withdrawal", false));
        records.push(create_test_record("USA", "South Africa", "2024-01-01", 200.0, "Finance", MoneySource::Legal, "Cash Withdrawal", false));
        records.push(create_test_record("UK", "South Africa", "2024-01-02", 50.0, "Finance", MoneySource::Legal, "Cash Withdrawal", false));
        records.push(create_test_record("UK", "Narnia", "2024-01-01", 75.0, "Finance", MoneySource::Legal, "Cash Withdrawal", false));
        records
    }

    #[test]
    fn test_compute_resolves_destination() {
        let (_, table, _) = build(create_round_trip_records());

        assert_eq!(table.len(), 3);
        let flow = &table.flows()[0];
        assert_eq!(flow.origin_iso3.as_deref(), Some("USA"));
        assert_eq!(flow.destination_iso3.as_deref(), Some("GBR"));
        assert!(flow.is_routable());
    }

    #[test]
    fn test_compute_unresolved_destination() {
        let (_, table, _) = build(vec![create_test_record(
            "UK", "Narnia", "2024-01-01", 75.0, "Finance", MoneySource::Legal, "Cash Withdrawal", false,
        )]);

        assert_eq!(table.len(), 1);
        assert!(table.flows()[0].destination_iso3.is_none());
        assert!(!table.flows()[0].is_routable());
    }

    #[test]
    fn test_compute_drops_duplicates_on_natural_key() {
        let mut records = create_round_trip_records();
        // Same key, different industry/legality: still a duplicate after projection
        records.push(create_test_record("USA", "UK", "2024-01-01", 1_000_000.0, "Casinos", MoneySource::Legal, "Cash Withdrawal", false));
        // Different amount: kept
        records.push(create_test_record("USA", "UK", "2024-01-01", 1_000_001.0, "Finance", MoneySource::Legal, "Cash Withdrawal", false));

        let (_, table, _) = build(records);
        assert_eq!(table.len(), 4);
    }

    #[test]
    fn test_round_trip_net_series() {
        let (dataset, table, geo) = build(create_round_trip_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, Some(day("2024-01-01")));

        assert!(view.show_arrows);
        assert_eq!(view.flows.len(), 3);
        assert_eq!(view.net.get("USA"), Some(500_000.0));
        assert_eq!(view.net.get("GBR"), Some(-500_000.0));
        assert_eq!(view.net.min, -500_000.0);
        assert_eq!(view.net.max, 500_000.0);
    }

    #[test]
    fn test_only_flows_on_queried_date() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        for date in ["2024-01-01", "2024-01-02"] {
            let view = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, Some(day(date)));
            assert!(view.flows.iter().all(|f| f.date == day(date)));
            assert_eq!(view.date, Some(day(date)));
        }
    }

    #[test]
    fn test_date_clamped_into_range() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let early = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, Some(day("2020-01-01")));
        assert_eq!(early.date, Some(day("2024-01-01")));
        assert!(!early.flows.is_empty());

        let late = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, Some(day("2030-01-01")));
        assert_eq!(late.date, Some(day("2024-01-02")));
        assert_eq!(late.flows.len(), 1);

        let missing = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, None);
        assert_eq!(missing.date, Some(day("2024-01-01")));
    }

    #[test]
    fn test_net_equals_received_minus_sent() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, Some(day("2024-01-01")));

        let on_date: Vec<&FlowRecord> = table.on_date(day("2024-01-01")).collect();
        for (iso3, net) in &view.net.values {
            let received: f64 = on_date
                .iter()
                .filter(|f| f.destination_iso3.as_deref() == Some(iso3.as_str()))
                .map(|f| f.amount)
                .sum();
            let sent: f64 = on_date
                .iter()
                .filter(|f| f.origin_iso3.as_deref() == Some(iso3.as_str()))
                .map(|f| f.amount)
                .sum();
            assert!((net - (received - sent)).abs() < 1e-6, "{}", iso3);
        }

        let total_received: f64 = on_date.iter().filter(|f| f.destination_iso3.is_some()).map(|f| f.amount).sum();
        let total_sent: f64 = on_date.iter().filter(|f| f.origin_iso3.is_some()).map(|f| f.amount).sum();
        assert!((view.net.total() - (total_received - total_sent)).abs() < 1e-6);
    }

    #[test]
    fn test_origin_only() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(
            DirectionFlags::ORIGIN,
            &CountrySelector::Country("USA".to_string()),
            Some(day("2024-01-01")),
        );

        assert!(view.show_arrows);
        assert!(view.flows.iter().all(|f| f.origin_iso3.as_deref() == Some("USA")));
        assert_eq!(view.flows.len(), 3);
        assert_eq!(view.net.values.len(), 1);
        assert_eq!(view.net.get("USA"), Some(-1_500_200.0));
    }

    #[test]
    fn test_destination_only() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(
            DirectionFlags::DESTINATION,
            &CountrySelector::Country("USA".to_string()),
            Some(day("2024-01-01")),
        );

        assert!(view.flows.iter().all(|f| f.destination_iso3.as_deref() == Some("USA")));
        assert_eq!(view.flows.len(), 2);
        assert_eq!(view.net.get("USA"), Some(2_000_300.0));
    }

    #[test]
    fn test_both_directions_country_union() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(
            DirectionFlags::BOTH,
            &CountrySelector::Country("South Africa".to_string()),
            Some(day("2024-01-01")),
        );

        assert_eq!(view.flows.len(), 2);
        assert_eq!(view.net.get("ZAF"), Some(200.0 - 300.0));
        assert_eq!(view.net.get("USA"), Some(300.0 - 200.0));
    }

    #[test]
    fn test_no_direction_zero_fills_and_hides_arrows() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(
            DirectionFlags::NONE,
            &CountrySelector::Country("UK".to_string()),
            Some(day("2024-01-01")),
        );

        assert!(!view.show_arrows);
        // Union filter still applies to the flow slice
        assert!(view
            .flows
            .iter()
            .all(|f| f.origin_iso3.as_deref() == Some("GBR") || f.destination_iso3.as_deref() == Some("GBR")));
        assert_eq!(view.net.values.len(), geo.len());
        assert!(view.net.values.values().all(|v| *v == 0.0));
        assert_eq!(view.net.min, view.net.max);
    }

    #[test]
    fn test_unrouted_flows_excluded_from_arrows() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, Some(day("2024-01-01")));

        assert!(view.flows.iter().all(|f| f.is_routable()));
        assert!(view.flows.iter().all(|f| f.destination_country != "Narnia"));
        // The unresolved destination still counts as money sent by the UK
        assert_eq!(view.net.get("GBR"), Some(1_500_000.0 - 2_000_000.0 - 75.0));
    }

    #[test]
    fn test_unknown_country_is_empty_not_error() {
        let (dataset, table, geo) = build(mixed_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(
            DirectionFlags::BOTH,
            &CountrySelector::Country("Atlantis".to_string()),
            Some(day("2024-01-01")),
        );

        assert!(view.flows.is_empty());
        assert!(view.net.is_empty());
        assert_eq!((view.net.min, view.net.max), (0.0, 0.0));
    }

    #[test]
    fn test_empty_dataset() {
        let (dataset, table, geo) = build(Vec::new());
        let filter = FlowFilter::new(&dataset, &table, &geo);

        let view = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, None);
        assert_eq!(view.date, None);
        assert!(view.flows.is_empty());
    }

    #[test]
    fn test_direction_flags_from_options() {
        assert_eq!(DirectionFlags::from_options(&["origin", "destiny"]), DirectionFlags::BOTH);
        assert_eq!(DirectionFlags::from_options(&["destination"]), DirectionFlags::DESTINATION);
        assert_eq!(DirectionFlags::from_options(&["Origin"]), DirectionFlags::ORIGIN);
        assert_eq!(DirectionFlags::from_options::<&str>(&[]), DirectionFlags::NONE);
    }

    #[test]
    fn test_country_selector_parse() {
        assert_eq!(CountrySelector::parse("ALL"), CountrySelector::All);
        assert_eq!(CountrySelector::parse(""), CountrySelector::All);
        assert_eq!(CountrySelector::parse("UK"), CountrySelector::Country("UK".to_string()));
    }

    #[test]
    fn test_shade_uses_extrema() {
        let (dataset, table, geo) = build(create_round_trip_records());
        let filter = FlowFilter::new(&dataset, &table, &geo);
        let view = filter.filter(DirectionFlags::BOTH, &CountrySelector::All, Some(day("2024-01-01")));

        let colors = view.net.shade(&ColorScale::default());
        assert_eq!(colors.get("GBR").map(String::as_str), Some("#FFFFB2"));
        assert_eq!(colors.get("USA").map(String::as_str), Some("#BD0026"));
    }
}
