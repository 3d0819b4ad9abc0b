//! WDL input templates.
//!
//! A template is a workflow inputs JSON document whose blank values mark the
//! columns a sample sheet has to fill in.

use crate::constants::{labels, template as tokens};
use crate::errors::DomainError;
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Where a batch-import column pulls its value from in an earlier batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ImportSource {
    Input,
    Output,
    Label,
}

impl ImportSource {
    fn detect(value: &str) -> Option<(Self, &str)> {
        [
            (ImportSource::Input, tokens::BATCH_INPUT_TOKEN),
            (ImportSource::Output, tokens::BATCH_OUTPUT_TOKEN),
            (ImportSource::Label, tokens::BATCH_LABEL_TOKEN),
        ]
        .into_iter()
        .find_map(|(source, token)| value.strip_prefix(token).map(|rest| (source, rest.trim())))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchImport {
    pub column: String,
    pub source: ImportSource,
    /// Output key, input key or label name to read on the earlier workflow.
    pub key: String,
}

#[derive(Debug, Clone)]
pub struct WdlInputTemplate {
    doc: Map<String, Value>,
    workflow_name: String,
}

impl WdlInputTemplate {
    pub fn parse(text: &str) -> Result<Self, DomainError> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            DomainError::validation("WDL input template", vec![format!("not valid JSON: {}", e)])
        })?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        let Value::Object(doc) = value else {
            return Err(DomainError::validation(
                "WDL input template",
                vec!["template must be a JSON object".to_string()],
            ));
        };

        let workflow_name = doc
            .keys()
            .find(|k| !k.starts_with('#'))
            .and_then(|k| k.split('.').next())
            .map(str::to_string)
            .ok_or_else(|| {
                DomainError::validation(
                    "WDL input template",
                    vec!["template contains no workflow inputs".to_string()],
                )
            })?;

        let template = Self { doc, workflow_name };
        template.validate()?;
        tracing::info!(
            "Parsed WDL input template for workflow '{}' ({} required column(s))",
            template.workflow_name,
            template.required_columns().len()
        );
        Ok(template)
    }

    fn validate(&self) -> Result<(), DomainError> {
        let mut violations = Vec::new();
        if self.required_columns().is_empty() {
            violations.push(
                "template must have at least one empty value to be filled from the sample sheet"
                    .to_string(),
            );
        }
        for import in self.batch_imports() {
            if import.source == ImportSource::Label
                && !labels::REQUIRED.contains(&import.key.as_str())
                && import.key != labels::WORKFLOW_ID
            {
                violations.push(format!(
                    "column '{}' imports unknown label '{}' (expected one of: {}, {})",
                    import.column,
                    import.key,
                    labels::REQUIRED.join(", "),
                    labels::WORKFLOW_ID
                ));
            }
        }
        DomainError::check("WDL input template", violations)
    }

    pub fn workflow_name(&self) -> &str {
        &self.workflow_name
    }

    pub fn default_value(&self, column: &str) -> Option<&Value> {
        self.doc.get(column)
    }

    fn is_column(&self, key: &str) -> bool {
        key.strip_prefix(self.workflow_name.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }

    fn is_required(&self, key: &str, value: &Value) -> bool {
        if !self.is_column(key) {
            return false;
        }
        match value {
            Value::Array(items) => items.is_empty(),
            Value::String(s) => s.is_empty() || ImportSource::detect(s).is_some(),
            _ => false,
        }
    }

    /// Every key the sample sheet may set, in template order.
    pub fn columns(&self) -> Vec<&str> {
        self.doc
            .keys()
            .filter(|k| self.is_column(k))
            .map(String::as_str)
            .collect()
    }

    pub fn required_columns(&self) -> Vec<&str> {
        self.doc
            .iter()
            .filter(|(k, v)| self.is_required(k, v))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn optional_columns(&self) -> Vec<&str> {
        self.doc
            .iter()
            .filter(|(k, v)| self.is_column(k) && !self.is_required(k, v))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Required columns whose sheet values are split into lists.
    pub fn array_columns(&self) -> Vec<&str> {
        self.doc
            .iter()
            .filter(|(k, v)| v.is_array() && self.is_required(k, v))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn is_array_column(&self, column: &str) -> bool {
        self.doc
            .get(column)
            .is_some_and(|v| v.is_array() && self.is_required(column, v))
    }

    pub fn batch_imports(&self) -> Vec<BatchImport> {
        self.doc
            .iter()
            .filter(|(k, _)| self.is_column(k))
            .filter_map(|(k, v)| {
                let (source, key) = ImportSource::detect(v.as_str()?)?;
                Some(BatchImport {
                    column: k.clone(),
                    source,
                    key: key.to_string(),
                })
            })
            .collect()
    }

    pub fn imports_from_batch(&self) -> bool {
        !self.batch_imports().is_empty()
    }

    /// Prefixes a bare input name with the workflow name.
    pub fn qualify_column(&self, column: &str) -> String {
        if self.is_column(column) {
            column.to_string()
        } else {
            format!("{}.{}", self.workflow_name, column)
        }
    }

    /// Columns of a freshly initialised sample sheet: required columns then
    /// the requested optional ones. Unknown optional columns are all reported.
    pub fn sheet_columns(&self, optional: &[String]) -> Result<Vec<String>, DomainError> {
        let mut columns: Vec<String> = self
            .required_columns()
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut violations = Vec::new();
        for col in optional {
            let qualified = self.qualify_column(col);
            if !self.doc.contains_key(&qualified) {
                violations.push(format!("optional column '{}' does not appear in the template", col));
            } else if !columns.contains(&qualified) {
                columns.push(qualified);
            }
        }
        DomainError::check("Optional column list", violations)?;
        Ok(columns)
    }

    /// Text written into a new sample sheet cell for `column`.
    pub fn default_cell(&self, column: &str) -> String {
        match self.doc.get(column) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) if items.is_empty() => String::new(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }

    fn cell_value(&self, column: &str, raw: &str) -> Value {
        if self.is_array_column(column) {
            return Value::Array(split_list_cell(raw).into_iter().map(Value::String).collect());
        }
        match self.doc.get(column) {
            Some(Value::String(_)) | None => Value::String(raw.to_string()),
            Some(_) => serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())),
        }
    }

    /// Input document for one sample sheet row. Empty cells keep the
    /// template default.
    pub fn make_input<'a, I>(&self, row: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut doc = self.doc.clone();
        for (column, raw) in row {
            if raw.trim().is_empty() {
                continue;
            }
            doc.insert(column.to_string(), self.cell_value(column, raw.trim()));
        }
        doc
    }

    /// Single input document for a whole sheet. Array columns receive every
    /// row's value; scalar columns must agree across rows.
    pub fn make_gather_input(
        &self,
        headers: &[String],
        rows: &[Vec<String>],
    ) -> Result<Map<String, Value>, DomainError> {
        let mut doc = self.doc.clone();
        let mut violations = Vec::new();
        for (idx, column) in headers.iter().enumerate() {
            let cells: Vec<&str> = rows
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|cell| cell.trim())
                .filter(|cell| !cell.is_empty())
                .collect();
            if cells.is_empty() {
                continue;
            }
            let is_list = self.is_array_column(column)
                || self.doc.get(column).is_some_and(Value::is_array);
            if is_list {
                let values = cells
                    .iter()
                    .map(|cell| Value::String(cell.to_string()))
                    .collect();
                doc.insert(column.clone(), Value::Array(values));
                continue;
            }
            let distinct: BTreeSet<&str> = cells.iter().copied().collect();
            if distinct.len() > 1 {
                violations.push(format!(
                    "column '{}' is not a list input but has {} different values",
                    column,
                    distinct.len()
                ));
                continue;
            }
            doc.insert(column.clone(), self.cell_value(column, cells[0]));
        }
        DomainError::check("Gather sample sheet", violations)?;
        Ok(doc)
    }
}

/// Splits `[a, "b", 'c']` style cells into their items.
pub fn split_list_cell(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .replace(['"', '\''], "")
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
