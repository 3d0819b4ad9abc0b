use crate::error::Result;
use chrono::Local;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets, Attribute, Cell, Color, Table};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use wdlbatch_core::constants::files::TIMESTAMP_FORMAT;

pub fn file_stamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// `{prefix}.{kind}.{stamp}.{ext}`
pub fn stamped_path(prefix: &Path, kind: &str, stamp: &str, ext: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_os_string();
    name.push(format!(".{}.{}.{}", kind, stamp, ext));
    PathBuf::from(name)
}

pub fn timestamped_path(prefix: &Path, kind: &str, ext: &str) -> PathBuf {
    stamped_path(prefix, kind, &file_stamp(), ext)
}

/// Column-ordered rows destined for a CSV file and the console.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ReportTable {
    /// Lays out keyed rows in `order`. Keys outside `order` are ignored.
    pub fn from_records(order: &[&str], records: &[BTreeMap<String, String>]) -> Self {
        let columns: Vec<String> = order.iter().map(|c| c.to_string()).collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        Self { columns, rows }
    }

    /// Like `from_records`, but keeps only columns that hold a value in at
    /// least one row.
    pub fn from_populated_records(order: &[&str], records: &[BTreeMap<String, String>]) -> Self {
        let populated: Vec<&str> = order
            .iter()
            .copied()
            .filter(|c| records.iter().any(|r| r.get(*c).is_some_and(|v| !v.is_empty())))
            .collect();
        Self::from_records(&populated, records)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn column(&self, column: &str) -> Option<Vec<&str>> {
        let idx = self.columns.iter().position(|c| c == column)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let file = fs_err::File::create(path)?;
        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        tracing::info!("Wrote report to {}", path.display());
        Ok(())
    }

    pub fn render(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(
                self.columns
                    .iter()
                    .map(|c| Cell::new(c).add_attribute(Attribute::Bold).fg(Color::Cyan)),
            );
        for row in &self.rows {
            table.add_row(row.iter().map(Cell::new));
        }
        table
    }
}
