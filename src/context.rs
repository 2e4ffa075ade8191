// 🗺️ Pipeline Context - Load-once base tables shared by every view
//
// Built explicitly at process start and handed to callers (CLI, API server).
// Immutable after construction: every query borrows it and returns a new value.

use crate::config::PipelineConfig;
use crate::dataset::{Dataset, DatasetSummary};
use crate::flows::{CountrySelector, DirectionFlags, FlowFilter, FlowTable, FlowView};
use crate::geo_reference::GeoReference;
use crate::geocoder::Geocoder;
use crate::industry::{IndustryAggregator, IndustryBreakdown};
use crate::ledger::{load_csv, TransactionRecord};
use crate::legality::{LegalityAggregator, LegalityReport};
use crate::palette::Palette;
use crate::timeseries::{TimeSeriesAggregator, TimeSeriesQuery, TimeSeriesReport};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;

pub struct PipelineContext {
    geo: GeoReference,
    dataset: Dataset,
    flows: FlowTable,
    palette: Palette,
}

impl PipelineContext {
    /// Full startup load: boundaries + geocoded entities, then the ledger.
    /// Any failure aborts; there is no partially loaded context.
    pub fn load(config: &PipelineConfig, geocoder: &dyn Geocoder) -> Result<Self> {
        tracing::info!("Loading pipeline");

        let geo = GeoReference::load(config, geocoder).context("Failed to load geo reference")?;

        let transactions = load_csv(&config.transactions_path).with_context(|| {
            format!(
                "Failed to load transactions from {}",
                config.transactions_path.display()
            )
        })?;

        Ok(Self::from_parts(geo, transactions, config.palette.clone()))
    }

    /// Build from already-loaded tables
    pub fn from_parts(geo: GeoReference, transactions: Vec<TransactionRecord>, palette: Palette) -> Self {
        let dataset = Dataset::join(transactions, &geo);
        let flows = FlowTable::compute(&dataset, &geo);

        PipelineContext {
            geo,
            dataset,
            flows,
            palette,
        }
    }

    // ========================================================================
    // BASE TABLES
    // ========================================================================

    pub fn geo(&self) -> &GeoReference {
        &self.geo
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn flow_table(&self) -> &FlowTable {
        &self.flows
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn summary(&self) -> &DatasetSummary {
        self.dataset.summary()
    }

    /// ISO3 → display name, for labelling the net series
    pub fn country_names(&self) -> BTreeMap<String, String> {
        self.geo.names_by_iso3()
    }

    // ========================================================================
    // VIEWS
    // ========================================================================

    pub fn flow_filter(&self) -> FlowFilter<'_> {
        FlowFilter::new(&self.dataset, &self.flows, &self.geo)
    }

    pub fn flows(&self, directions: DirectionFlags, country: &CountrySelector, date: Option<NaiveDate>) -> FlowView {
        self.flow_filter().filter(directions, country, date)
    }

    pub fn legality(&self) -> LegalityReport {
        LegalityAggregator::aggregate(self.dataset.records())
    }

    pub fn industries(&self, country: &str, normalize: bool) -> IndustryBreakdown {
        IndustryAggregator::aggregate(country, normalize, self.dataset.records())
    }

    pub fn industry_ranking(&self) -> Vec<(String, f64)> {
        IndustryAggregator::ranking(self.dataset.records())
    }

    pub fn timeseries(&self, query: &TimeSeriesQuery) -> TimeSeriesReport {
        TimeSeriesAggregator::aggregate(query, self.dataset.records())
    }
}

// ============================================================================
// TESTS
// ============================================================================
