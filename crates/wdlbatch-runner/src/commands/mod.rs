use crate::error::CliError;
use wdlbatch_client::CromwellEngine;
use wdlbatch_core::config::{BatchConfig, Config};
use wdlbatch_core::model::WorkflowType;
use wdlbatch_core::samplesheet::{validate_sample_sheet, SampleSheet, SampleSheetValidator};

pub mod abort;
pub mod init_sheet;
pub mod make_inputs;
pub mod merge;
pub mod status;
pub mod submit;

pub struct AppContext<'a> {
    pub config: &'a Config,
    pub server_url: &'a str,
}

impl AppContext<'_> {
    pub fn engine(&self) -> Result<CromwellEngine, CliError> {
        Ok(CromwellEngine::new(self.server_url)?)
    }
}

/// Reads a sample sheet and lets the batch config vouch for it.
pub(crate) fn load_checked_sheet(
    batch_config: &BatchConfig,
    path: &std::path::Path,
) -> Result<SampleSheet, CliError> {
    let sheet = SampleSheet::read(path)?;
    let mut validators = batch_config.sample_sheet_validators.clone();
    // Scatter sample ids end up as label values.
    if batch_config.wf_type == WorkflowType::Scatter {
        validators.push(SampleSheetValidator::LabelSafeSampleIds);
    }
    validate_sample_sheet(
        &sheet,
        &batch_config.template,
        &batch_config.sample_id_col,
        &validators,
    )?;
    Ok(sheet)
}
