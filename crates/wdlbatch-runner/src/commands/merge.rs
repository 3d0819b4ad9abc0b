use crate::cli::MergeArgs;
use crate::error::CliError;
use colored::Colorize;
use wdlbatch_core::config::BatchConfig;
use wdlbatch_core::samplesheet::SampleSheet;

pub fn handle_merge(args: MergeArgs) -> Result<(), CliError> {
    let batch_config = BatchConfig::load(&args.batch_config)?;
    let sheet = SampleSheet::read(&args.sample_sheet)?;
    let merged = sheet.merge_replicates(&batch_config.sample_id_col)?;
    merged.write(&args.output)?;

    println!(
        "{} Merged {} row(s) into {} sample(s): {}",
        "OK".green().bold(),
        sheet.len(),
        merged.len(),
        args.output.display()
    );
    Ok(())
}
