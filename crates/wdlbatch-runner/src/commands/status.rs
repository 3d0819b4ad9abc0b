use crate::cli::StatusArgs;
use crate::commands::AppContext;
use crate::error::CliError;
use colored::Colorize;
use std::path::{Path, PathBuf};
use wdlbatch_client::report::timestamped_path;
use wdlbatch_client::{get_batch_status, Engine, StatusOptions};

pub fn handle_status(args: StatusArgs, context: &AppContext<'_>) -> Result<(), CliError> {
    let engine = context.engine()?;
    engine.health()?;
    let options = StatusOptions {
        include_excluded: args.show_excluded,
        progress_interval: context.config.status_progress_interval,
    };
    run_status(&args.batch, &args.output_dir, &engine, &options)?;
    Ok(())
}

/// Prints the batch summary and writes `{dir}/{batch}.batch_status.{ts}.csv`.
pub fn run_status(
    batch: &str,
    output_dir: &Path,
    engine: &dyn Engine,
    options: &StatusOptions,
) -> Result<PathBuf, CliError> {
    let report = get_batch_status(engine, batch, options)?;

    println!("{}", report.to_table().render());
    println!("{}", report.render_counts());

    fs_err::create_dir_all(output_dir)?;
    let path = timestamped_path(&output_dir.join(batch), "batch_status", "csv");
    report.to_table().write_csv(&path)?;
    println!(
        "{} {} workflow(s) in batch '{}'; report written to {}",
        "OK".green().bold(),
        report.total(),
        batch.cyan(),
        path.display()
    );
    Ok(path)
}
