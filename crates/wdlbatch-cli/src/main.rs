use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::Colorize;
use std::path::PathBuf;
use wdlbatch_core::logging;

#[derive(Parser)]
#[command(name = "wdlbatch")]
#[command(about = "Batch submission and bookkeeping for Cromwell workflow servers")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(long, help = "Print help for all commands recursively")]
    help_all: bool,

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
enum Commands {
    #[command(flatten)]
    Runner(Box<wdlbatch_runner::cli::Commands>),

    #[command(about = "Generate shell completions")]
    Completions(CompletionsArgs),
}

#[derive(Args)]
struct CompletionsArgs {
    #[arg(long, help = "Shell to generate completions for")]
    shell: Shell,
}

fn print_help_all() {
    let cmd = Cli::command();
    print_command_help(&cmd, 0);
}

fn print_command_help(cmd: &clap::Command, depth: usize) {
    let indent = "  ".repeat(depth);

    if cmd.is_hide_set() {
        return;
    }

    if depth == 0 {
        println!("{}", "=".repeat(60));
        println!("WDLBATCH - Complete Command Reference");
        println!("{}", "=".repeat(60));
        println!();
    } else {
        println!();
        println!("{}{}", indent, "-".repeat(50 - indent.len()));
        println!("{}Command: {}", indent, cmd.get_name());
        println!("{}{}", indent, "-".repeat(50 - indent.len()));
    }

    let mut help_cmd = cmd.clone();
    for line in help_cmd.render_help().to_string().lines() {
        println!("{}{}", indent, line);
    }

    for subcmd in cmd.get_subcommands() {
        print_command_help(subcmd, depth + 1);
    }
}

fn init_logging(verbose: u8, config: Option<&PathBuf>) {
    let level = logging::resolve_level(verbose);
    let logging_config = match config {
        Some(path) => wdlbatch_core::config::load_config_from(path),
        None => wdlbatch_core::config::load_config(),
    }
    .map(|c| c.logging)
    .unwrap_or_default();

    if let Err(e) = logging::init_session_logger(level, &logging_config) {
        eprintln!(
            "{}",
            format!("[ERROR] Failed to initialize session logger: {}", e).red()
        );
        logging::init_stderr_logger(level);
    }
}

fn main() {
    let cli = Cli::parse();

    if cli.help_all {
        print_help_all();
        return;
    }

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _ = Cli::command().print_help();
            return;
        }
    };

    match command {
        Commands::Runner(cmd) => {
            init_logging(cli.verbose, cli.config.as_ref());

            let runner_cli = wdlbatch_runner::cli::Cli {
                command: *cmd,
                server_url: cli.server_url,
                config: cli.config,
                verbose: cli.verbose,
            };

            if let Err(e) = wdlbatch_runner::run(runner_cli) {
                eprintln!("{}", format!("[ERROR] {}", e).red());
                std::process::exit(1);
            }
        }
        Commands::Completions(args) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(args.shell, &mut cmd, name, &mut std::io::stdout());
        }
    }
}
