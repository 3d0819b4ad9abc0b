use crate::cli::AbortArgs;
use crate::commands::AppContext;
use crate::error::CliError;
use colored::Colorize;
use wdlbatch_client::{abort_batch, AbortSummary, Engine};

pub fn handle_abort(args: AbortArgs, context: &AppContext<'_>) -> Result<(), CliError> {
    let engine = context.engine()?;
    engine.health()?;
    run_abort(&args.batch, &engine)?;
    Ok(())
}

pub fn run_abort(batch: &str, engine: &dyn Engine) -> Result<AbortSummary, CliError> {
    println!("- Aborting pending workflows of batch '{}'...", batch.cyan());
    let summary = abort_batch(engine, batch)?;

    for id in &summary.aborted {
        println!("  {} {}", "ABORTED".yellow().bold(), id.to_string().dimmed());
    }
    for (id, reason) in &summary.failed {
        println!("  {} {} {}", "FAIL".red().bold(), id.to_string().dimmed(), reason);
    }
    println!(
        "{}/{} ({:.1}%) pending workflows aborted ({} workflow(s) in batch)",
        summary.aborted.len().to_string().bold(),
        summary.attempted,
        summary.success_rate(),
        summary.total
    );
    Ok(summary)
}
