// 📒 Transaction Ledger - CSV → TransactionRecord
// Raw rows are deserialized by header name, then normalized into immutable records
// with a calendar date derived from the timestamp.

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// SOURCE OF MONEY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoneySource {
    Legal,
    Illegal,
}

impl MoneySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MoneySource::Legal => "Legal",
            MoneySource::Illegal => "Illegal",
        }
    }

    pub fn is_illegal(&self) -> bool {
        matches!(self, MoneySource::Illegal)
    }
}

impl FromStr for MoneySource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "legal" => Ok(MoneySource::Legal),
            "illegal" => Ok(MoneySource::Illegal),
            other => Err(anyhow!("Unknown source of money: {:?}", other)),
        }
    }
}

impl fmt::Display for MoneySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// RAW ROW (as it appears in the CSV)
// ============================================================================

/// One CSV row before normalization. Unknown columns are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTransactionRow {
    #[serde(rename = "Country")]
    pub country: String,

    #[serde(rename = "Destination Country")]
    pub destination_country: String,

    #[serde(rename = "Date of Transaction")]
    pub timestamp: String,

    #[serde(rename = "Amount (USD)")]
    pub amount: f64,

    #[serde(rename = "Industry")]
    pub industry: String,

    #[serde(rename = "Source of Money")]
    pub source_of_money: String,

    #[serde(rename = "Transaction Type")]
    pub transaction_type: String,

    #[serde(rename = "Reported by Authority", deserialize_with = "deserialize_flag")]
    pub reported_by_authority: bool,
}

/// Accepts True/False, 1/0, yes/no in any case
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_flag(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid boolean: {:?}", raw)))
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" | "t" => Some(true),
        "false" | "0" | "no" | "n" | "f" => Some(false),
        _ => None,
    }
}

// ============================================================================
// TRANSACTION RECORD
// ============================================================================

/// A ledger transaction. Created once at load time, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub origin_country: String,
    pub destination_country: String,
    pub timestamp: NaiveDateTime,
    /// Calendar date derived from `timestamp`
    pub date: NaiveDate,
    pub amount: f64,
    pub industry: String,
    pub source_of_money: MoneySource,
    pub transaction_type: String,
    pub reported_by_authority: bool,
}

impl TransactionRecord {
    pub fn is_illegal(&self) -> bool {
        self.source_of_money.is_illegal()
    }
}

impl TryFrom<RawTransactionRow> for TransactionRecord {
    type Error = anyhow::Error;

    fn try_from(row: RawTransactionRow) -> Result<Self> {
        let timestamp = parse_timestamp(&row.timestamp)?;

        if !row.amount.is_finite() || row.amount < 0.0 {
            return Err(anyhow!("Amount must be a non-negative number, got {}", row.amount));
        }

        let source_of_money = row.source_of_money.parse::<MoneySource>()?;

        Ok(TransactionRecord {
            origin_country: row.country.trim().to_string(),
            destination_country: row.destination_country.trim().to_string(),
            date: timestamp.date(),
            timestamp,
            amount: row.amount,
            industry: row.industry.trim().to_string(),
            source_of_money,
            transaction_type: row.transaction_type.trim().to_string(),
            reported_by_authority: row.reported_by_authority,
        })
    }
}

/// Parse a timestamp (supports `YYYY-MM-DD HH:MM:SS`, ISO `T` form, bare dates, MM/DD/YYYY)
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }

    for format in ["%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
        }
    }

    Err(anyhow!("Unparsable transaction timestamp: {:?}", raw))
}

// ============================================================================
// LOADING
// ============================================================================

/// Load the ledger from a CSV file
pub fn load_csv(csv_path: &Path) -> Result<Vec<TransactionRecord>> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open transactions file: {}", csv_path.display()))?;

    let records = read_transactions(file)
        .with_context(|| format!("Failed to load transactions from {}", csv_path.display()))?;

    tracing::info!(
        "Loaded {} transactions from {}",
        records.len(),
        csv_path.display()
    );

    Ok(records)
}

/// Read ledger rows from any reader (header row required)
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<TransactionRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();

    for (line_num, result) in rdr.deserialize::<RawTransactionRow>().enumerate() {
        // +2 because: 1-indexed + header row
        let row = result.with_context(|| format!("Failed to parse CSV line {}", line_num + 2))?;
        let record = TransactionRecord::try_from(row)
            .with_context(|| format!("Invalid transaction on CSV line {}", line_num + 2))?;
        records.push(record);
    }

    Ok(records)
}

// ============================================================================
// TESTS
// ============================================================================
