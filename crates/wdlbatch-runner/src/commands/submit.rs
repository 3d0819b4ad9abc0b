use crate::cli::SubmitArgs;
use crate::commands::AppContext;
use crate::error::CliError;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use wdlbatch_client::submission::SubmitReport;
use wdlbatch_client::{
    load_batch, submit_batch, BatchEvent, BatchItem, CsvReportSink, Engine, SubmitOptions,
    WorkflowSource,
};
use wdlbatch_core::errors::DomainError;
use wdlbatch_core::model::ConflictPolicy;

pub fn handle_submit(args: SubmitArgs, context: &AppContext<'_>) -> Result<(), CliError> {
    let policy = match &args.conflict_policy {
        Some(p) => p
            .parse::<ConflictPolicy>()
            .map_err(|_| DomainError::UnknownConflictPolicy(p.clone()))?,
        None => context.config.conflict_policy,
    };
    let items = load_batch(&args.inputs, &args.labels)?;
    let source = WorkflowSource {
        workflow: args.wdl,
        dependencies: args.imports,
    };
    let prefix = args.output_prefix.unwrap_or_else(|| {
        PathBuf::from(
            items
                .first()
                .and_then(|item| item.labels().batch())
                .unwrap_or("batch"),
        )
    });

    let engine = context.engine()?;
    engine.health()?;
    run_submit(&engine, &source, &items, policy, prefix)?;
    Ok(())
}

/// Runs the batch on a worker thread while this thread prints its progress.
pub fn run_submit(
    engine: &dyn Engine,
    source: &WorkflowSource,
    items: &[BatchItem],
    policy: ConflictPolicy,
    report_prefix: PathBuf,
) -> Result<SubmitReport, CliError> {
    println!(
        "- Submitting {} workflow(s) under conflict policy '{}'...",
        items.len().to_string().bold(),
        policy.to_string().cyan()
    );

    let (tx, rx) = mpsc::channel();
    let mut sink = CsvReportSink::new(report_prefix);

    let outcome = thread::scope(|scope| {
        let worker = scope.spawn(|| {
            let options = SubmitOptions {
                policy,
                event_sender: Some(tx),
            };
            submit_batch(engine, source, items, &options, &mut sink)
        });

        for event in rx {
            print_event(&event, items);
        }
        worker.join()
    });

    let result = outcome.map_err(|_| CliError::WorkerPanicked)?;
    match result {
        Ok(report) => {
            println!("{}", report.to_table().render());
            println!("{} {}", "OK".green().bold(), report.summary());
            if let Some(path) = sink.written() {
                println!("Submission report written to {}", path.display());
            }
            Ok(report)
        }
        Err(source) => Err(CliError::SubmissionFailed {
            source,
            report: sink.written().map(PathBuf::from),
        }),
    }
}

fn print_event(event: &BatchEvent, items: &[BatchItem]) {
    let total = items.len();
    let name = |index: usize| {
        items
            .get(index)
            .map(|item| item.labels().display_name().to_string())
            .unwrap_or_default()
    };
    match event {
        BatchEvent::Started { batch, total } => {
            println!("- Batch '{}': {} item(s)", batch.cyan(), total);
        }
        BatchEvent::CheckingConflicts { batch_sample, .. } => {
            tracing::debug!("Checking earlier workflows of '{}'", batch_sample);
        }
        BatchEvent::Superseding { index, ids } => {
            let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
            println!(
                "  {} [{}/{}] {} replaces {}",
                "~~".yellow(),
                index + 1,
                total,
                name(*index).dimmed(),
                ids.join(", ")
            );
        }
        BatchEvent::Submitted { index, id } => {
            println!(
                "  {} [{}/{}] {} as {}",
                "OK".green().bold(),
                index + 1,
                total,
                name(*index).dimmed(),
                id
            );
        }
        BatchEvent::Blocked { index, reason } => {
            println!(
                "  {} [{}/{}] {}",
                "SKIP".yellow().bold(),
                index + 1,
                total,
                reason
            );
        }
        BatchEvent::Failed { index, error } => {
            println!(
                "  {} [{}/{}] {}: {}",
                "FAIL".red().bold(),
                index + 1,
                total,
                name(*index).dimmed(),
                error
            );
        }
        BatchEvent::Finished { submitted, total } => {
            println!("- Finished: {}/{} submitted", submitted, total);
        }
    }
}
