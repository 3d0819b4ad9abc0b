//! Delimited sample sheets and the validators a batch config can enable.

use crate::errors::{ConfigError, DomainError};
use crate::labels::is_valid_label_value;
use crate::template::WdlInputTemplate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;
use std::path::Path;

/// `.tsv` files are tab separated, everything else comma separated.
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleSheet {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl SampleSheet {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let file = fs_err::File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter_for(path))
            .trim(csv::Trim::All)
            .from_reader(file);

        let headers = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            rows.push(record.iter().map(str::to_string).collect());
        }
        tracing::debug!("Read {} row(s) from sample sheet '{}'", rows.len(), path.display());
        Ok(Self { headers, rows })
    }

    pub fn write(&self, path: &Path) -> Result<(), ConfigError> {
        let file = fs_err::File::create(path)?;
        let mut writer = csv::WriterBuilder::new()
            .delimiter(delimiter_for(path))
            .from_writer(file);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(idx).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    /// `(column, value)` pairs of one row.
    pub fn record(&self, index: usize) -> Vec<(&str, &str)> {
        self.rows
            .get(index)
            .map(|row| {
                self.headers
                    .iter()
                    .map(String::as_str)
                    .zip(row.iter().map(String::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replaces or appends a column. Missing cells are left empty.
    pub fn set_column(&mut self, name: &str, values: &[String]) {
        let idx = match self.column_index(name) {
            Some(idx) => idx,
            None => {
                self.headers.push(name.to_string());
                for row in &mut self.rows {
                    row.push(String::new());
                }
                self.headers.len() - 1
            }
        };
        while self.rows.len() < values.len() {
            self.rows.push(vec![String::new(); self.headers.len()]);
        }
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[idx] = value.clone();
        }
    }

    pub fn sample_ids(&self, id_col: &str) -> Result<Vec<&str>, DomainError> {
        self.column(id_col).ok_or_else(|| {
            DomainError::validation(
                "Sample sheet",
                vec![format!("id column '{}' does not appear in the sample sheet", id_col)],
            )
        })
    }

    /// Structural checks every sample sheet must pass.
    pub fn validate(&self, id_col: &str) -> Result<(), DomainError> {
        let mut violations = Vec::new();
        if self.is_empty() {
            violations.push("sample sheet must contain one or more samples".to_string());
        }
        match self.column(id_col) {
            None => violations.push(format!(
                "id column '{}' does not appear in the sample sheet",
                id_col
            )),
            Some(ids) => {
                let empty = ids.iter().filter(|id| id.is_empty()).count();
                if empty > 0 {
                    violations.push(format!("{} sample(s) have an empty id", empty));
                }
                let mut seen = HashSet::new();
                let duplicates: BTreeSet<&str> = ids
                    .iter()
                    .filter(|id| !id.is_empty() && !seen.insert(**id))
                    .copied()
                    .collect();
                if !duplicates.is_empty() {
                    let duplicates: Vec<&str> = duplicates.into_iter().collect();
                    violations.push(format!("sample ids are not unique: {}", duplicates.join(", ")));
                }
            }
        }
        DomainError::check("Sample sheet", violations)
    }

    /// Collapses rows sharing an id. Other columns are joined with `", "`
    /// in first-seen order.
    pub fn merge_replicates(&self, id_col: &str) -> Result<SampleSheet, DomainError> {
        let idx = self.column_index(id_col).ok_or_else(|| {
            DomainError::validation(
                "Sample sheet",
                vec![format!("id column '{}' does not appear in the sample sheet", id_col)],
            )
        })?;

        let mut order: Vec<String> = Vec::new();
        let mut merged: HashMap<String, Vec<String>> = HashMap::new();
        for row in &self.rows {
            let id = row.get(idx).cloned().unwrap_or_default();
            match merged.get_mut(&id) {
                None => {
                    order.push(id.clone());
                    merged.insert(id, row.clone());
                }
                Some(existing) => {
                    for (col, value) in row.iter().enumerate() {
                        if col != idx {
                            if let Some(cell) = existing.get_mut(col) {
                                cell.push_str(", ");
                                cell.push_str(value);
                            }
                        }
                    }
                }
            }
        }

        let rows = order
            .into_iter()
            .filter_map(|id| merged.remove(&id))
            .collect();
        Ok(SampleSheet::new(self.headers.clone(), rows))
    }
}

/// Sample sheet checks that can be switched on from a batch config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SampleSheetValidator {
    /// Required template columns present and filled, no unknown columns.
    TemplateColumns,
    /// Sample ids usable as label values.
    LabelSafeSampleIds,
}

impl fmt::Display for SampleSheetValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleSheetValidator::TemplateColumns => write!(f, "template-columns"),
            SampleSheetValidator::LabelSafeSampleIds => write!(f, "label-safe-sample-ids"),
        }
    }
}

impl SampleSheetValidator {
    pub fn check(
        &self,
        sheet: &SampleSheet,
        template: &WdlInputTemplate,
        id_col: &str,
    ) -> Vec<String> {
        match self {
            SampleSheetValidator::TemplateColumns => check_template_columns(sheet, template),
            SampleSheetValidator::LabelSafeSampleIds => sheet
                .column(id_col)
                .unwrap_or_default()
                .into_iter()
                .filter(|id| !id.is_empty() && !is_valid_label_value(id))
                .map(|id| {
                    format!(
                        "sample id '{}' may only contain alphanumeric characters, hyphens and underscores",
                        id
                    )
                })
                .collect(),
        }
    }
}

fn check_template_columns(sheet: &SampleSheet, template: &WdlInputTemplate) -> Vec<String> {
    let mut violations = Vec::new();
    for col in template.required_columns() {
        match sheet.column(col) {
            None => violations.push(format!("missing required column '{}'", col)),
            Some(values) => {
                let empty = values.iter().filter(|v| v.is_empty()).count();
                if empty > 0 {
                    violations.push(format!(
                        "{} sample(s) missing a value in required column '{}'",
                        empty, col
                    ));
                }
            }
        }
    }
    let known = template.columns();
    for col in sheet.headers() {
        if !known.contains(&col.as_str()) {
            violations.push(format!("column '{}' does not appear in the WDL template", col));
        }
    }
    violations
}

/// Runs the structural checks plus every requested validator, always
/// including `template-columns`, and reports all violations at once.
pub fn validate_sample_sheet(
    sheet: &SampleSheet,
    template: &WdlInputTemplate,
    id_col: &str,
    validators: &[SampleSheetValidator],
) -> Result<(), DomainError> {
    let mut violations = match sheet.validate(id_col) {
        Ok(()) => Vec::new(),
        Err(DomainError::Validation { violations, .. }) => violations,
        Err(other) => return Err(other),
    };

    let mut enabled: BTreeSet<SampleSheetValidator> = validators.iter().copied().collect();
    enabled.insert(SampleSheetValidator::TemplateColumns);
    for validator in &enabled {
        tracing::debug!("Applying sample sheet validator '{}'", validator);
        violations.extend(validator.check(sheet, template, id_col));
    }
    DomainError::check("Sample sheet", violations)
}
