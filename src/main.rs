use anyhow::{anyhow, Result};
use std::env;
use tracing_subscriber::EnvFilter;

use flow_atlas::{
    CountrySelector, DirectionFlags, NominatimGeocoder, PipelineConfig, PipelineContext, VERSION,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();

    match args.get(1).map(String::as_str) {
        Some("check") => run_check(),
        Some("report") => run_report(parse_date_arg(&args[2..])?),
        _ => {
            print_usage();
            Ok(())
        }
    }
}

fn print_usage() {
    println!("🗺️  Flow Atlas v{}", VERSION);
    println!();
    println!("Usage:");
    println!("  flow-atlas check                      Load and validate the pipeline");
    println!("  flow-atlas report [--date YYYY-MM-DD] Print overlays for one date");
    println!();
    println!("Config: ${} (built-in defaults when unset)", flow_atlas::CONFIG_ENV);
}

/// Raw `--date` value; parsing and clamping happen against the loaded dataset
fn parse_date_arg(args: &[String]) -> Result<Option<String>> {
    match args {
        [] => Ok(None),
        [flag, value] if flag == "--date" => Ok(Some(value.clone())),
        _ => Err(anyhow!("Unexpected arguments: {}", args.join(" "))),
    }
}

fn load_context() -> Result<PipelineContext> {
    let config = PipelineConfig::from_env()?;

    println!("📂 Transactions: {}", config.transactions_path.display());
    println!("🌍 Boundaries:   {}", config.boundaries_path.display());

    let geocoder = NominatimGeocoder::new(&config.geocoder)?;
    PipelineContext::load(&config, &geocoder)
}

fn run_check() -> Result<()> {
    println!("🔍 Checking pipeline");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let context = load_context()?;
    let summary = context.summary();

    println!("✓ {} countries in geo reference", context.geo().len());
    println!("✓ {} transactions joined", summary.record_count);
    println!("✓ {} flows", context.flow_table().len());

    let unmatched = context.dataset().records().iter().filter(|r| !r.has_geo()).count();
    if unmatched > 0 {
        println!("⚠️  {} transactions without an origin boundary", unmatched);
    }

    println!("\n✅ Pipeline OK");
    Ok(())
}

fn run_report(raw_date: Option<String>) -> Result<()> {
    let context = load_context()?;
    let summary = context.summary();
    let date = summary.resolve_date(raw_date.as_deref());

    println!("\n📊 Dataset");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Transactions: {}", summary.record_count);
    match (summary.min_date, summary.max_date) {
        (Some(min), Some(max)) => println!("Dates:        {} → {}", min, max),
        _ => println!("Dates:        (none)"),
    }
    println!("Countries:    {}", summary.countries.join(", "));
    println!("Industries:   {}", summary.industries.join(", "));

    println!("\n⚖️  Illegal transactions reported");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    let legality = context.legality();
    for (country, overview) in &legality.countries {
        println!(
            "{:<20} {:>5.1}%  ({}/{})  ${:.2}",
            country,
            overview.illegal_ratio * 100.0,
            overview.reported_count,
            overview.illegal_count,
            overview.illegal_amount
        );
    }

    println!("\n🏭 Industries by total amount");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for (industry, total) in context.industry_ranking().iter().rev() {
        println!("{:<20} ${:.2}", industry, total);
    }

    let view = context.flows(DirectionFlags::BOTH, &CountrySelector::All, date);
    let names = context.country_names();

    println!("\n🧭 Net flows");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    match view.date {
        Some(day) => println!("Date: {} ({} flows)", day, view.flows.len()),
        None => println!("Date: (no data)"),
    }
    for (iso3, net) in &view.net.values {
        let name = names.get(iso3).map(String::as_str).unwrap_or(iso3.as_str());
        println!("{:<20} {:>+16.2}", name, net);
    }

    Ok(())
}
