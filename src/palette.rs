// 🎨 Palette - Style lookup tables as data
// Color scale for net-flow shading + categorical colors for countries,
// industries and transaction types. Every lookup has a fixed fallback.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// COLOR SCALE
// ============================================================================

/// One stop of a sequential color scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    /// Position in [0, 1]
    pub position: f64,
    pub color: String,
}

/// Sequential color scale used to shade countries by net amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorScale {
    pub stops: Vec<ColorStop>,
}

impl ColorScale {
    pub fn new(stops: Vec<ColorStop>) -> Self {
        ColorScale { stops }
    }

    /// Map an amount linearly into [0, 1] and pick the last stop at or below it.
    ///
    /// `min == max` collapses to the first stop; values outside
    /// `[min, max]` are clamped to the end stops. Stops are expected in
    /// ascending `position` order.
    pub fn color_for(&self, amount: f64, min: f64, max: f64) -> &str {
        let Some(first) = self.stops.first() else {
            return DEFAULT_SCALE_COLOR;
        };

        let span = max - min;
        if span == 0.0 || !span.is_finite() || !amount.is_finite() {
            return &first.color;
        }

        let position = ((amount - min) / span).clamp(0.0, 1.0);
        self.stops
            .iter()
            .rev()
            .find(|stop| stop.position <= position)
            .unwrap_or(first)
            .color
            .as_str()
    }

    /// Color for a ratio already in [0, 1] (e.g. illegal ratio)
    pub fn color_for_ratio(&self, ratio: f64) -> &str {
        self.color_for(ratio, 0.0, 1.0)
    }
}

impl Default for ColorScale {
    fn default() -> Self {
        let stops = [
            (0.0, "#FFFFB2"),
            (0.25, "#FECC5C"),
            (0.5, "#FD8D3C"),
            (0.75, "#F03B20"),
            (1.0, "#BD0026"),
        ]
        .iter()
        .map(|(position, color)| ColorStop {
            position: *position,
            color: color.to_string(),
        })
        .collect();

        ColorScale { stops }
    }
}

// ============================================================================
// PALETTE
// ============================================================================

pub const DEFAULT_SCALE_COLOR: &str = "#FFFFB2";
pub const DEFAULT_COUNTRY_COLOR: &str = "black";
pub const DEFAULT_INDUSTRY_COLOR: &str = "#6c757d";
pub const DEFAULT_TRANSACTION_TYPE_COLOR: &str = "#FFFFFF";

/// Categorical color tables handed to the rendering layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    /// ISO3 → color (flow arrows, map legend)
    #[serde(default)]
    pub country_by_iso3: HashMap<String, String>,

    /// Display name → color (scatter markers)
    #[serde(default)]
    pub country_by_name: HashMap<String, String>,

    #[serde(default)]
    pub industries: HashMap<String, String>,

    #[serde(default)]
    pub transaction_types: HashMap<String, String>,

    #[serde(default)]
    pub scale: ColorScale,
}

impl Palette {
    pub fn country_color(&self, iso3: &str) -> &str {
        self.country_by_iso3
            .get(iso3)
            .map(String::as_str)
            .unwrap_or(DEFAULT_COUNTRY_COLOR)
    }

    pub fn country_name_color(&self, name: &str) -> &str {
        self.country_by_name
            .get(name)
            .map(String::as_str)
            .unwrap_or(DEFAULT_COUNTRY_COLOR)
    }

    pub fn industry_color(&self, industry: &str) -> &str {
        self.industries
            .get(industry)
            .map(String::as_str)
            .unwrap_or(DEFAULT_INDUSTRY_COLOR)
    }

    pub fn transaction_type_color(&self, transaction_type: &str) -> &str {
        self.transaction_types
            .get(transaction_type)
            .map(String::as_str)
            .unwrap_or(DEFAULT_TRANSACTION_TYPE_COLOR)
    }
}

fn table(entries: &[(&str, &str)]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            country_by_iso3: table(&[
                ("USA", "blue"),
                ("ZAF", "orange"),
                ("CHE", "green"),
                ("RUS", "red"),
                ("BRA", "#7FE956"),
                ("GBR", "brown"),
                ("IND", "pink"),
                ("CHN", "gray"),
                ("SGP", "cyan"),
                ("ARE", "magenta"),
            ]),
            country_by_name: table(&[
                ("USA", "blue"),
                ("South Africa", "orange"),
                ("Switzerland", "green"),
                ("Russia", "red"),
                ("Brazil", "#7FE956"),
                ("UK", "brown"),
                ("India", "pink"),
                ("China", "gray"),
                ("Singapore", "cyan"),
                ("UAE", "magenta"),
            ]),
            industries: table(&[
                ("Arms Trade", "#ed5903"),
                ("Construction", "#2eaf4d"),
                ("Luxury Goods", "#ffc107"),
                ("Casinos", "#17a2b8"),
                ("Oil & Gas", "#8550e8"),
                ("Real Estate", "#f23f92"),
                ("Finance", "#c5e03eb3"),
            ]),
            transaction_types: table(&[
                ("Offshore Transfer", "#AEC6CF"),
                ("Cash Withdrawal", "#FFB347"),
                ("Cryptocurrency", "#77DD77"),
                ("Stocks Transfer", "#FFB6C1"),
                ("Property Purchase", "#CBAACB"),
            ]),
            scale: ColorScale::default(),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_endpoints() {
        let scale = ColorScale::default();

        assert_eq!(scale.color_for(0.0, 0.0, 100.0), "#FFFFB2");
        assert_eq!(scale.color_for(100.0, 0.0, 100.0), "#BD0026");
        assert_eq!(scale.color_for(50.0, 0.0, 100.0), "#FD8D3C");
    }

    #[test]
    fn test_scale_collapses_when_range_is_flat() {
        let scale = ColorScale::default();

        assert_eq!(scale.color_for(7.0, 7.0, 7.0), "#FFFFB2");
        assert_eq!(scale.color_for(0.0, 0.0, 0.0), "#FFFFB2");
    }

    #[test]
    fn test_scale_clamps_out_of_range() {
        let scale = ColorScale::default();

        assert_eq!(scale.color_for(-500.0, -100.0, 100.0), "#FFFFB2");
        assert_eq!(scale.color_for(500.0, -100.0, 100.0), "#BD0026");
    }

    #[test]
    fn test_negative_range() {
        let scale = ColorScale::default();

        // -1.5M..+0.5M, zero sits at 75% → the 0.75 stop
        assert_eq!(scale.color_for(0.0, -1_500_000.0, 500_000.0), "#F03B20");
    }

    #[test]
    fn test_uneven_stops_use_positions() {
        let stop = |position: f64, color: &str| ColorStop {
            position,
            color: color.to_string(),
        };
        let scale = ColorScale::new(vec![stop(0.0, "low"), stop(0.9, "mid"), stop(1.0, "high")]);

        assert_eq!(scale.color_for(0.5, 0.0, 1.0), "low");
        assert_eq!(scale.color_for(0.89, 0.0, 1.0), "low");
        assert_eq!(scale.color_for(0.95, 0.0, 1.0), "mid");
        assert_eq!(scale.color_for(1.0, 0.0, 1.0), "high");
    }

    #[test]
    fn test_scale_below_first_stop_uses_first() {
        let scale = ColorScale::new(vec![
            ColorStop { position: 0.2, color: "a".to_string() },
            ColorStop { position: 0.6, color: "b".to_string() },
        ]);

        assert_eq!(scale.color_for(0.1, 0.0, 1.0), "a");
        assert_eq!(scale.color_for(0.7, 0.0, 1.0), "b");
    }

    #[test]
    fn test_color_for_ratio() {
        let scale = ColorScale::default();

        assert_eq!(scale.color_for_ratio(0.0), "#FFFFB2");
        assert_eq!(scale.color_for_ratio(0.6), "#FD8D3C");
        assert_eq!(scale.color_for_ratio(1.0), "#BD0026");
        assert_eq!(scale.color_for_ratio(3.0), "#BD0026");
    }

    #[test]
    fn test_empty_scale_falls_back() {
        let scale = ColorScale::new(Vec::new());
        assert_eq!(scale.color_for(1.0, 0.0, 2.0), DEFAULT_SCALE_COLOR);
    }

    #[test]
    fn test_unknown_categories_fall_back() {
        let palette = Palette::default();

        assert_eq!(palette.country_color("USA"), "blue");
        assert_eq!(palette.country_color("XXX"), DEFAULT_COUNTRY_COLOR);
        assert_eq!(palette.country_name_color("Atlantis"), DEFAULT_COUNTRY_COLOR);
        assert_eq!(palette.industry_color("Casinos"), "#17a2b8");
        assert_eq!(palette.industry_color("Fishing"), DEFAULT_INDUSTRY_COLOR);
        assert_eq!(palette.transaction_type_color("Barter"), DEFAULT_TRANSACTION_TYPE_COLOR);
    }
}
