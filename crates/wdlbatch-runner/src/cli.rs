use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Batch submission and bookkeeping for Cromwell workflow servers.",
    long_about = "Turns a sample sheet into a labelled batch of WDL workflows, submits it to a Cromwell server and tracks the batch through its labels."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        help = "Cromwell server URL. Overrides the value in config.toml."
    )]
    pub server_url: Option<String>,

    #[arg(
        long,
        global = true,
        help = "Path to a config.toml to use instead of ~/.config/wdlbatch/config.toml"
    )]
    pub config: Option<PathBuf>,

    #[arg(short, long, action = clap::ArgAction::Count, global = true, help = "Increase verbosity level (-v warn, -vv info, -vvv debug)")]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Write an empty or pre-filled sample sheet for a batch config")]
    InitSampleSheet(InitSheetArgs),

    #[command(about = "Collapse sample sheet rows that share a sample id")]
    MergeReplicates(MergeArgs),

    #[command(about = "Turn a sample sheet into batch inputs and labels")]
    MakeInputs(MakeInputsArgs),

    #[command(about = "Submit a batch of workflows")]
    Submit(SubmitArgs),

    #[command(about = "Summarise the workflows of a batch")]
    Status(StatusArgs),

    #[command(about = "Abort every queued or running workflow of a batch")]
    Abort(AbortArgs),
}

#[derive(Args)]
pub struct InitSheetArgs {
    #[arg(short = 'c', long, help = "Batch config (TOML)")]
    pub batch_config: PathBuf,

    #[arg(short, long, help = "Sample sheet to write (.csv or .tsv)")]
    pub output: PathBuf,

    #[arg(
        long,
        default_value_t = 1,
        help = "Number of empty rows to write",
        conflicts_with = "populate_from_batch"
    )]
    pub rows: usize,

    #[arg(
        long = "optional-column",
        value_name = "COLUMN",
        help = "Optional template column to include. Can be repeated; 'ALL' adds every optional column."
    )]
    pub optional_columns: Vec<String>,

    #[arg(
        long,
        value_name = "BATCH",
        help = "Fill the sheet from the workflows of an earlier batch"
    )]
    pub populate_from_batch: Option<String>,
}

#[derive(Args)]
pub struct MergeArgs {
    #[arg(short = 'c', long, help = "Batch config (TOML)")]
    pub batch_config: PathBuf,

    #[arg(short, long, help = "Sample sheet to merge")]
    pub sample_sheet: PathBuf,

    #[arg(short, long, help = "Merged sample sheet to write")]
    pub output: PathBuf,
}

#[derive(Args)]
pub struct MakeInputsArgs {
    #[arg(short = 'c', long, help = "Batch config (TOML)")]
    pub batch_config: PathBuf,

    #[arg(short, long, help = "Sample sheet (.csv or .tsv)")]
    pub sample_sheet: PathBuf,

    #[arg(short, long, help = "Name of the new batch")]
    pub batch_name: String,

    #[arg(short, long, default_value = ".", help = "Directory for the generated files")]
    pub output_dir: PathBuf,

    #[arg(
        long,
        help = "Fail instead of warning when the batch name already exists on the server"
    )]
    pub unique_batch_name: bool,
}

#[derive(Args)]
pub struct SubmitArgs {
    #[arg(long, help = "WDL workflow source")]
    pub wdl: PathBuf,

    #[arg(long, help = "Zip file of WDL imports")]
    pub imports: Option<PathBuf>,

    #[arg(long, help = "Batch inputs JSON (from make-inputs)")]
    pub inputs: PathBuf,

    #[arg(long, help = "Batch labels JSON (from make-inputs)")]
    pub labels: PathBuf,

    #[arg(
        long,
        help = "What to do with earlier workflows of the same sample: 'rerun-failed', 'rerun-unless-success' or 'rerun-all'"
    )]
    pub conflict_policy: Option<String>,

    #[arg(
        long,
        help = "Path prefix of the submission report (defaults to the batch name)"
    )]
    pub output_prefix: Option<PathBuf>,
}

#[derive(Args)]
pub struct StatusArgs {
    #[arg(help = "Batch name")]
    pub batch: String,

    #[arg(short, long, default_value = ".", help = "Directory for the status report")]
    pub output_dir: PathBuf,

    #[arg(long, help = "Also report workflows excluded from the batch")]
    pub show_excluded: bool,
}

#[derive(Args)]
pub struct AbortArgs {
    #[arg(help = "Batch name")]
    pub batch: String,
}
