use std::io::Read;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::absorption_core::{derive_category, Category, FeatureVector};
use crate::utils::{clean_numeric, quarter_from_value, AnalysisError};

/// Canonical column names, applied positionally to the source header
pub const COLUMNS: [&str; 10] = [
    "AKUN",
    "URAIAN",
    "ANGGARAN_SEMULA",
    "ANGGARAN_REVISI",
    "REALISASI",
    "PENGEMBALIAN",
    "REALISASI_NETTO",
    "PERSEN_REALISASI",
    "SISA_ANGGARAN",
    "TRIWULAN",
];

/// Rows after the header that carry sheet metadata rather than data
pub const METADATA_ROWS: usize = 2;

/// One budget line exactly as read from the source, all fields as text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub account: String,
    pub description: String,
    pub original_budget: String,
    pub revised_budget: String,
    pub realized: String,
    pub returned: String,
    pub net_realized: String,
    pub realization_percent: String,
    pub remaining_budget: String,
    pub quarter: String,
}

impl RawRecord {
    /// Build from positional fields; absent trailing fields are empty
    pub fn from_fields<'a, I: IntoIterator<Item = &'a str>>(fields: I) -> Self {
        let mut it = fields.into_iter().map(str::to_string);
        let mut next = || it.next().unwrap_or_default();
        Self {
            account: next(),
            description: next(),
            original_budget: next(),
            revised_budget: next(),
            realized: next(),
            returned: next(),
            net_realized: next(),
            realization_percent: next(),
            remaining_budget: next(),
            quarter: next(),
        }
    }

    /// Coerce numeric fields; `None` if any cell is empty or unparsable
    ///
    /// Every column must be filled, `PERSEN_REALISASI` included, but its value
    /// is not used; the ratio is recomputed from net realized and revised
    /// amounts. A quarter outside 1-4 counts as missing.
    pub fn clean(&self) -> Option<BudgetRecord> {
        let description = self.description.trim();
        if description.is_empty() || self.realization_percent.trim().is_empty() {
            return None;
        }
        let quarter = clean_numeric(&self.quarter).and_then(|q| quarter_from_value(q).ok())?;
        Some(BudgetRecord {
            account_code: clean_numeric(&self.account)?,
            description: description.to_string(),
            original_budget: clean_numeric(&self.original_budget)?,
            revised_budget: clean_numeric(&self.revised_budget)?,
            realized: clean_numeric(&self.realized)?,
            returned: clean_numeric(&self.returned)?,
            net_realized: clean_numeric(&self.net_realized)?,
            remaining_budget: clean_numeric(&self.remaining_budget)?,
            quarter: f64::from(quarter),
        })
    }
}

/// A budget line with every numeric field resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetRecord {
    pub account_code: f64,
    pub description: String,
    pub original_budget: f64,
    pub revised_budget: f64,
    pub realized: f64,
    pub returned: f64,
    pub net_realized: f64,
    pub remaining_budget: f64,
    pub quarter: f64,
}

impl BudgetRecord {
    /// Model input for this line
    pub fn features(&self) -> Result<FeatureVector, AnalysisError> {
        FeatureVector::new(
            self.account_code,
            self.original_budget,
            self.revised_budget,
            self.remaining_budget,
            self.quarter,
        )
    }

    /// Attach the recomputed ratio and category, or `None` if the ratio is undefined
    pub fn label(self) -> Option<LabeledRecord> {
        let (realization_ratio, category) =
            derive_category(self.net_realized, self.revised_budget)?;
        Some(LabeledRecord {
            record: self,
            realization_ratio,
            category,
        })
    }
}

/// Cleaned line with its derived label; the table shape handed to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    #[serde(flatten)]
    pub record: BudgetRecord,
    pub realization_ratio: f64,
    pub category: Category,
}

/// Outcome of cleaning and labeling a raw table
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanedTable {
    pub records: Vec<LabeledRecord>,
    pub rows_read: usize,
    pub dropped_missing: usize,
    pub dropped_undefined_ratio: usize,
}

/// A raw budget table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetTable {
    pub records: Vec<RawRecord>,
}

impl BudgetTable {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self { records }
    }

    /// Get the number of raw rows
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if table is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Load a table from CSV
    ///
    /// The header line is replaced positionally by [`COLUMNS`] and the
    /// following [`METADATA_ROWS`] rows are skipped. Short rows are padded
    /// with empty (missing) fields.
    pub fn from_csv<R: Read>(reader: R) -> crate::Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.len() != COLUMNS.len() {
            warn!(
                source_columns = headers.len(),
                expected = COLUMNS.len(),
                "header width differs from {}; columns are mapped by position",
                COLUMNS.join(",")
            );
        }
        debug!(source_columns = headers.len(), "read header row");

        let mut records = Vec::new();
        for (i, result) in reader.records().enumerate() {
            let record = result.with_context(|| format!("malformed CSV row {}", i + 2))?;
            if i < METADATA_ROWS {
                continue;
            }
            records.push(RawRecord::from_fields(record.iter()));
        }

        Ok(Self::new(records))
    }

    /// Load a table from a CSV file on disk
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open {}", path.display()))?;
        let table = Self::from_csv(file)
            .with_context(|| format!("failed to read {}", path.display()))?;
        info!(path = %path.display(), rows = table.len(), "loaded budget table");
        Ok(table)
    }

    /// Clean numeric fields, drop incomplete rows, derive labels
    ///
    /// Rows with any empty or unparsable cell, and rows whose revised
    /// budget is zero (undefined ratio), are dropped and counted.
    pub fn clean(&self) -> CleanedTable {
        let mut table = CleanedTable {
            rows_read: self.records.len(),
            ..CleanedTable::default()
        };

        for raw in &self.records {
            let Some(record) = raw.clean() else {
                table.dropped_missing += 1;
                continue;
            };
            match record.label() {
                Some(labeled) => table.records.push(labeled),
                None => table.dropped_undefined_ratio += 1,
            }
        }

        info!(
            rows_read = table.rows_read,
            kept = table.records.len(),
            dropped_missing = table.dropped_missing,
            dropped_undefined_ratio = table.dropped_undefined_ratio,
            "cleaned budget table"
        );
        table
    }
}
