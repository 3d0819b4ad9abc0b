use crate::cli::InitSheetArgs;
use crate::commands::AppContext;
use crate::error::CliError;
use colored::Colorize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use wdlbatch_client::engine::current_labels;
use wdlbatch_client::{Engine, LabelQuery, MetadataKeys};
use wdlbatch_core::config::BatchConfig;
use wdlbatch_core::constants::{labels as keys, metadata};
use wdlbatch_core::errors::DomainError;
use wdlbatch_core::model::{JobState, WorkflowId};
use wdlbatch_core::samplesheet::SampleSheet;
use wdlbatch_core::template::{BatchImport, ImportSource, WdlInputTemplate};

pub const UNSUCCESSFUL: &str = "UNSUCCESSFUL/UNFINISHED WORKFLOW";
const ALL_OPTIONAL: &str = "ALL";

pub fn handle_init_sheet(args: InitSheetArgs, context: &AppContext<'_>) -> Result<(), CliError> {
    let batch_config = BatchConfig::load(&args.batch_config)?;
    let columns = sheet_columns(&batch_config, &args.optional_columns)?;

    let sheet = match &args.populate_from_batch {
        Some(batch) => {
            let engine = context.engine()?;
            engine.health()?;
            populate_from_batch(&engine, &batch_config, columns, batch)?
        }
        None => empty_sheet(&batch_config.template, columns, args.rows),
    };
    sheet.write(&args.output)?;

    println!(
        "{} Wrote sample sheet with {} column(s) and {} row(s) to {}",
        "OK".green().bold(),
        sheet.headers().len(),
        sheet.len(),
        args.output.display()
    );
    Ok(())
}

/// Required columns, the sample id column and the requested optional ones.
pub fn sheet_columns(batch_config: &BatchConfig, optional: &[String]) -> Result<Vec<String>, CliError> {
    let template = &batch_config.template;
    let optional: Vec<String> = if optional.iter().any(|c| c == ALL_OPTIONAL) {
        template.optional_columns().into_iter().map(str::to_string).collect()
    } else {
        optional.to_vec()
    };
    let mut columns = template.sheet_columns(&optional)?;
    if !columns.contains(&batch_config.sample_id_col) {
        columns.insert(0, batch_config.sample_id_col.clone());
    }
    Ok(columns)
}

pub fn empty_sheet(template: &WdlInputTemplate, columns: Vec<String>, rows: usize) -> SampleSheet {
    let imports = template.batch_imports();
    let row: Vec<String> = columns
        .iter()
        .map(|c| {
            // Import tokens are only resolved with --populate-from-batch.
            if imports.iter().any(|i| &i.column == c) {
                String::new()
            } else {
                template.default_cell(c)
            }
        })
        .collect();
    SampleSheet::new(columns, vec![row; rows])
}

/// One row per included workflow of `batch`, import columns resolved against
/// that workflow.
pub fn populate_from_batch(
    engine: &dyn Engine,
    batch_config: &BatchConfig,
    columns: Vec<String>,
    batch: &str,
) -> Result<SampleSheet, CliError> {
    let template = &batch_config.template;
    if !template.imports_from_batch() {
        tracing::warn!("The input template has no batch-import columns; only sample ids will be filled");
    }

    let imports = template.batch_imports();
    let ids = engine.query(&LabelQuery::batch(batch).included())?;
    if ids.is_empty() {
        return Err(DomainError::BatchNotFound(batch.to_string()).into());
    }

    let mut rows = Vec::with_capacity(ids.len());
    let mut seen = BTreeSet::new();
    let mut duplicates = Vec::new();
    for id in &ids {
        let row = workflow_row(engine, template, batch_config, &columns, &imports, id)?;
        let sample = row.0;
        if !seen.insert(sample.clone()) {
            duplicates.push(format!(
                "sample '{}' appears more than once in batch '{}' (workflow {})",
                sample, batch, id
            ));
        }
        rows.push((sample, row.1));
    }
    DomainError::check("Source batch", duplicates)?;

    rows.sort_by(|a, b| a.0.cmp(&b.0));
    tracing::info!("Filled {} row(s) from batch '{}'", rows.len(), batch);
    Ok(SampleSheet::new(
        columns,
        rows.into_iter().map(|(_, row)| row).collect(),
    ))
}

fn workflow_row(
    engine: &dyn Engine,
    template: &WdlInputTemplate,
    batch_config: &BatchConfig,
    columns: &[String],
    imports: &[BatchImport],
    id: &WorkflowId,
) -> Result<(String, Vec<String>), CliError> {
    let labels = current_labels(engine, id)?;
    let sample = labels.sample().unwrap_or_default().to_string();
    let state = engine.status(id)?;
    let meta = if state == JobState::Succeeded {
        engine.metadata(
            id,
            &MetadataKeys::include(&[metadata::OUTPUTS, metadata::INPUTS]),
        )?
    } else {
        tracing::warn!("Workflow {} for sample '{}' is {}", id, sample, state);
        Map::new()
    };

    let row = columns
        .iter()
        .map(|column| {
            if *column == batch_config.sample_id_col {
                return sample.clone();
            }
            let Some(import) = imports.iter().find(|i| &i.column == column) else {
                return template.default_cell(column);
            };
            if state != JobState::Succeeded {
                return UNSUCCESSFUL.to_string();
            }
            let value = match import.source {
                ImportSource::Output => lookup(meta.get(metadata::OUTPUTS), &import.key),
                ImportSource::Input => {
                    let key = if import.key.is_empty() {
                        column.as_str()
                    } else {
                        import.key.as_str()
                    };
                    lookup(meta.get(metadata::INPUTS), key)
                }
                ImportSource::Label if import.key == keys::WORKFLOW_ID => {
                    Some(Value::String(id.to_string()))
                }
                ImportSource::Label => labels.get(&import.key).map(|v| Value::String(v.to_string())),
            };
            match value {
                Some(v) => cell_text(&v),
                None => {
                    tracing::warn!(
                        "Workflow {} has no value for '{}' ({:?} import)",
                        id,
                        import.key,
                        import.source
                    );
                    String::new()
                }
            }
        })
        .collect();
    Ok((sample, row))
}

/// Finds `key` in a metadata section, either exactly or as the last segment
/// of a fully qualified name.
fn lookup(section: Option<&Value>, key: &str) -> Option<Value> {
    let map = section?.as_object()?;
    if let Some(v) = map.get(key) {
        return Some(v.clone());
    }
    let bare = key.rsplit('.').next().unwrap_or(key);
    map.iter()
        .find(|(k, _)| k.rsplit('.').next() == Some(bare))
        .map(|(_, v)| v.clone())
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(cell_text).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}
