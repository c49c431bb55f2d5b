//! Min/max scaling for displaying a table of records.
//!
//! Independent of [`crate::encoder`]: nothing here ever feeds the network.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::RawRecord;

/// Columns scaled by the display table when none are named.
pub const DISPLAY_COLUMNS: [&str; 4] = ["price", "sqft", "bedrooms", "bathrooms"];

/// Observed range of one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationStats {
    pub min: f64,
    pub max: f64,
}

impl NormalizationStats {
    /// Computes the range of `values`, `None` if there are none.
    pub fn from_values<I: IntoIterator<Item = f64>>(values: I) -> Option<Self> {
        let mut values = values.into_iter();
        let first = values.next()?;
        let mut stats = Self {
            min: first,
            max: first,
        };

        values.for_each(|v| stats.include(v));
        Some(stats)
    }

    pub fn include(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Scales `value` into `[0, 1]` relative to this range. A degenerate range maps to 0.
    pub fn normalize(&self, value: f64) -> f64 {
        let range = self.max - self.min;

        if range == 0.0 {
            return 0.0;
        }

        (value - self.min) / range
    }
}

/// A cell of the display table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DisplayCell {
    Scaled(Option<f64>),
    Text(String),
}

pub type DisplayRow = BTreeMap<String, DisplayCell>;

/// The display table plus the ranges its columns were scaled against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayTable {
    pub stats: BTreeMap<String, Option<NormalizationStats>>,
    pub rows: Vec<DisplayRow>,
}

impl DisplayTable {
    /// Checks the invariants a deserialized table may have lost.
    pub fn validate(&self) -> Result<(), String> {
        for (column, stats) in &self.stats {
            if let Some(NormalizationStats { min, max }) = stats {
                if !(min.is_finite() && max.is_finite() && min <= max) {
                    return Err(format!("column '{column}' has an invalid range [{min}, {max}]"));
                }
            }

            for (i, row) in self.rows.iter().enumerate() {
                match row.get(column) {
                    Some(DisplayCell::Scaled(None)) => {}
                    Some(DisplayCell::Scaled(Some(v))) if (0.0..=1.0).contains(v) => {}
                    _ => return Err(format!("row {i} has no scaled '{column}'")),
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MinMaxNormalizer;

impl MinMaxNormalizer {
    /// Range of the parseable cells of `column`.
    ///
    /// # Arguments
    /// * `records` - The records to scan.
    /// * `column` - The column name.
    ///
    /// # Returns
    /// `None` if no record has a numeric value in `column`.
    pub fn column_stats(&self, records: &[RawRecord], column: &str) -> Option<NormalizationStats> {
        NormalizationStats::from_values(records.iter().filter_map(|r| cell(r, column)))
    }

    /// Scales `value` against `stats`.
    pub fn normalize(&self, value: f64, stats: &NormalizationStats) -> f64 {
        stats.normalize(value)
    }

    /// Builds the display rows: the named columns are replaced by their scaled value (or `None`
    /// when unparseable), everything else is kept as text.
    pub fn normalize_records(&self, records: &[RawRecord], columns: &[&str]) -> Vec<DisplayRow> {
        self.table(records, columns).rows
    }

    /// Like `normalize_records`, keeping the column ranges alongside the rows.
    pub fn table(&self, records: &[RawRecord], columns: &[&str]) -> DisplayTable {
        let stats: BTreeMap<String, Option<NormalizationStats>> = columns
            .iter()
            .map(|&column| (column.to_string(), self.column_stats(records, column)))
            .collect();

        let rows = records
            .iter()
            .map(|record| {
                let mut row: DisplayRow = record
                    .iter()
                    .map(|(k, v)| (k.to_string(), DisplayCell::Text(v.to_string())))
                    .collect();

                for (column, stats) in &stats {
                    let scaled = cell(record, column)
                        .zip(stats.as_ref())
                        .map(|(value, stats)| stats.normalize(value));

                    row.insert(column.clone(), DisplayCell::Scaled(scaled));
                }

                row
            })
            .collect();

        DisplayTable { stats, rows }
    }
}

fn cell(record: &RawRecord, column: &str) -> Option<f64> {
    record
        .get(column)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<RawRecord> {
        vec![
            RawRecord::new().with("price", "100").with("city", "Pune"),
            RawRecord::new().with("price", "300").with("city", "Goa"),
            RawRecord::new().with("price", "n/a").with("city", "Agra"),
        ]
    }

    #[test]
    fn stats_skip_unparseable_cells() {
        let stats = MinMaxNormalizer.column_stats(&rows(), "price").unwrap();
        assert_eq!(stats, NormalizationStats { min: 100.0, max: 300.0 });
        assert_eq!(MinMaxNormalizer.column_stats(&rows(), "sqft"), None);
    }

    #[test]
    fn degenerate_range_maps_to_zero() {
        let stats = NormalizationStats::from_values([7.0, 7.0]).unwrap();
        assert_eq!(stats.normalize(7.0), 0.0);
    }

    #[test]
    fn table_scales_only_the_named_columns() {
        let table = MinMaxNormalizer.normalize_records(&rows(), &["price"]);

        assert_eq!(table[0]["price"], DisplayCell::Scaled(Some(0.0)));
        assert_eq!(table[1]["price"], DisplayCell::Scaled(Some(1.0)));
        assert_eq!(table[2]["price"], DisplayCell::Scaled(None));
        assert_eq!(table[2]["city"], DisplayCell::Text("Agra".into()));
    }

    #[test]
    fn table_keeps_the_ranges() {
        let table = MinMaxNormalizer.table(&rows(), &["price", "sqft"]);

        assert_eq!(table.stats["price"], Some(NormalizationStats { min: 100.0, max: 300.0 }));
        assert_eq!(table.stats["sqft"], None);
        assert_eq!(table.rows[0]["sqft"], DisplayCell::Scaled(None));
        assert!(table.validate().is_ok());
    }

    #[test]
    fn validation_rejects_unscaled_cells() {
        let mut table = MinMaxNormalizer.table(&rows(), &["price"]);
        table.rows[1].insert("price".into(), DisplayCell::Text("300".into()));

        assert!(table.validate().is_err());
    }

    #[test]
    fn table_serializes_flat() {
        let table = MinMaxNormalizer.normalize_records(&rows()[..2], &["price"]);
        let json = serde_json::to_value(&table).unwrap();

        assert_eq!(json[1]["price"], 1.0);
        assert_eq!(json[1]["city"], "Goa");
    }
}
