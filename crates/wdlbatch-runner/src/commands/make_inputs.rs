use crate::cli::MakeInputsArgs;
use crate::commands::{load_checked_sheet, AppContext};
use crate::error::CliError;
use colored::Colorize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use wdlbatch_client::report::{file_stamp, stamped_path, ReportTable};
use wdlbatch_client::{Engine, LabelQuery};
use wdlbatch_core::config::BatchConfig;
use wdlbatch_core::constants::labels as keys;
use wdlbatch_core::errors::DomainError;
use wdlbatch_core::labels::{validate_label_value, LabelSet};
use wdlbatch_core::model::WorkflowType;
use wdlbatch_core::samplesheet::SampleSheet;

const LABEL_REPORT_COLUMNS: [&str; 5] = [
    keys::SAMPLE,
    keys::BATCH,
    keys::BATCH_SAMPLE,
    keys::BATCH_STATUS,
    keys::UNIQUE,
];

/// Files written by one `make-inputs` run.
#[derive(Debug, Clone)]
pub struct BatchFiles {
    pub inputs: PathBuf,
    pub labels: PathBuf,
    pub report: PathBuf,
    pub config: PathBuf,
}

pub fn handle_make_inputs(args: MakeInputsArgs, context: &AppContext<'_>) -> Result<(), CliError> {
    validate_label_value("batch name", &args.batch_name)?;
    let batch_config = BatchConfig::load(&args.batch_config)?;
    let sheet = load_checked_sheet(&batch_config, &args.sample_sheet)?;
    let prepared = prepare_batch(&batch_config, &sheet, &args.batch_name)?;

    let engine = context.engine()?;
    check_batch_name(&engine, &args.batch_name, args.unique_batch_name)?;

    let files = write_batch(&batch_config, &prepared, &args.output_dir)?;
    println!("{} Batch '{}' prepared:", "OK".green().bold(), args.batch_name.cyan());
    println!("  inputs: {}", files.inputs.display());
    println!("  labels: {}", files.labels.display());
    println!("  report: {}", files.report.display());
    println!("  config: {}", files.config.display());
    Ok(())
}

/// Warns, or fails when `strict`, if workflows already carry `batch`.
pub fn check_batch_name(engine: &dyn Engine, batch: &str, strict: bool) -> Result<(), CliError> {
    let existing = match engine.query(&LabelQuery::batch(batch)) {
        Ok(ids) => ids,
        Err(e) if !strict => {
            tracing::warn!("Could not check whether batch name '{}' is in use: {}", batch, e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    if existing.is_empty() {
        return Ok(());
    }
    if strict {
        return Err(DomainError::BatchNameInUse(batch.to_string()).into());
    }
    tracing::warn!(
        "Batch name '{}' is already used by {} workflow(s); new workflows will join that batch",
        batch,
        existing.len()
    );
    Ok(())
}

/// Inputs and labels of a batch, built and validated but not yet written.
#[derive(Debug, Clone)]
pub struct PreparedBatch {
    pub batch: String,
    pub inputs: Vec<Map<String, Value>>,
    pub labels: Vec<LabelSet>,
}

/// Builds the inputs and labels of a batch. Every sample that cannot be
/// labelled is reported at once.
pub fn prepare_batch(
    batch_config: &BatchConfig,
    sheet: &SampleSheet,
    batch: &str,
) -> Result<PreparedBatch, CliError> {
    let template = &batch_config.template;
    let workflow_name = template.workflow_name();

    let (inputs, labels) = match batch_config.wf_type {
        WorkflowType::Scatter => {
            let ids = sheet.sample_ids(&batch_config.sample_id_col)?;
            let mut label_sets = Vec::with_capacity(ids.len());
            let mut violations = Vec::new();
            for id in &ids {
                match LabelSet::for_sample(workflow_name, batch, id) {
                    Ok(labels) => label_sets.push(labels),
                    Err(e) => violations.push(e.to_string()),
                }
            }
            DomainError::check("Sample labels", violations)?;
            let inputs = (0..sheet.len())
                .map(|i| template.make_input(sheet.record(i)))
                .collect();
            (inputs, label_sets)
        }
        WorkflowType::Gather => {
            let doc = template.make_gather_input(sheet.headers(), sheet.rows())?;
            let labels = LabelSet::for_sample(workflow_name, batch, batch)?;
            (vec![doc], vec![labels])
        }
    };
    Ok(PreparedBatch {
        batch: batch.to_string(),
        inputs,
        labels,
    })
}

/// Writes a prepared batch under `out_dir` with one shared timestamp.
pub fn write_batch(
    batch_config: &BatchConfig,
    prepared: &PreparedBatch,
    out_dir: &Path,
) -> Result<BatchFiles, CliError> {
    let batch = prepared.batch.as_str();
    fs_err::create_dir_all(out_dir)?;
    let prefix = out_dir.join(batch);
    let stamp = file_stamp();
    let files = BatchFiles {
        inputs: stamped_path(&prefix, "make_batch.inputs", &stamp, "json"),
        labels: stamped_path(&prefix, "make_batch.labels", &stamp, "json"),
        report: stamped_path(&prefix, "make_batch.report", &stamp, "csv"),
        config: stamped_path(&prefix, "make_batch.config", &stamp, "toml"),
    };

    match (batch_config.wf_type, prepared.inputs.first(), prepared.labels.first()) {
        (WorkflowType::Gather, Some(inputs), Some(labels)) => {
            write_json(&files.inputs, inputs)?;
            write_json(&files.labels, labels)?;
        }
        _ => {
            write_json(&files.inputs, &prepared.inputs)?;
            write_json(&files.labels, &prepared.labels)?;
        }
    }

    let rows: Vec<BTreeMap<String, String>> = prepared.labels.iter().map(|l| l.0.clone()).collect();
    ReportTable::from_records(&LABEL_REPORT_COLUMNS, &rows).write_csv(&files.report)?;
    fs_err::copy(&batch_config.path, &files.config)?;

    tracing::info!(
        "Prepared {} {} workflow(s) for batch '{}'",
        prepared.inputs.len(),
        batch_config.wf_type,
        batch
    );
    Ok(files)
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value)?;
    fs_err::write(path, text)?;
    Ok(())
}
