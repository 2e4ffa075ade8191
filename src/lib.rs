// Flow Atlas - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;        // Pipeline config + style tables
pub mod palette;       // Categorical colors + sequential scale
pub mod ledger;        // Transaction CSV loader
pub mod geocoder;      // Boundary lookup for countries missing from the boundary file
pub mod geo_reference; // Named country boundaries + representative points
pub mod dataset;       // Transactions ⟕ geo reference
pub mod flows;         // Flow table + date/country/direction filter
pub mod legality;      // Illegal-ratio overlays
pub mod industry;      // Legal vs illegal per industry
pub mod timeseries;    // Amount over time, destination totals, spend vs receive
pub mod context;       // Load-once shared base tables

// Re-export commonly used types
pub use config::{GeocodedCountry, GeocoderConfig, PipelineConfig, CONFIG_ENV};
pub use palette::{ColorScale, ColorStop, Palette};
pub use ledger::{load_csv, read_transactions, MoneySource, TransactionRecord};
pub use geocoder::{Geocoder, NominatimGeocoder, StaticGeocoder};
pub use geo_reference::{GeoEntity, GeoPoint, GeoReference};
pub use dataset::{Dataset, DatasetSummary, EnrichedRecord};
pub use flows::{
    CountrySelector, DirectionFlags, FlowFilter, FlowRecord, FlowTable, FlowView, NetFlowSeries,
};
pub use legality::{CountryLegalitySummary, LegalityAggregator, LegalityReport};
pub use industry::{IndustryAggregator, IndustryBreakdown, IndustrySplit};
pub use timeseries::{
    DestinationTotal, SeriesPoint, SpendReceive, TimeSeriesAggregator, TimeSeriesQuery,
    TimeSeriesReport,
};
pub use context::PipelineContext;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
