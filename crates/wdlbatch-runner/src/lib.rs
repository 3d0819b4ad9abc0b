pub mod cli;
pub mod commands;
pub mod error;

use cli::{Cli, Commands};
use commands::AppContext;
use error::CliError;
use wdlbatch_core::config;

pub fn run(cli: Cli) -> Result<(), CliError> {
    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };
    let server_url = cli
        .server_url
        .clone()
        .unwrap_or_else(|| config.server_url.clone());
    tracing::debug!("Using workflow server {}", server_url);

    let context = AppContext {
        config: &config,
        server_url: &server_url,
    };

    match cli.command {
        Commands::InitSampleSheet(args) => commands::init_sheet::handle_init_sheet(args, &context),
        Commands::MergeReplicates(args) => commands::merge::handle_merge(args),
        Commands::MakeInputs(args) => commands::make_inputs::handle_make_inputs(args, &context),
        Commands::Submit(args) => commands::submit::handle_submit(args, &context),
        Commands::Status(args) => commands::status::handle_status(args, &context),
        Commands::Abort(args) => commands::abort::handle_abort(args, &context),
    }
}
