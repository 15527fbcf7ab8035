pub mod commands;

use clap::{Parser, Subcommand};
use faqbot_core::config::load_env_file;
use std::process::ExitCode;

use commands::{CommandResult, EXIT_CONFIG_FAILURE};

#[derive(Debug, Parser)]
#[command(
    name = "faqbot-cli",
    about = "FAQBot operator CLI",
    long_about = "Register the bot's slash commands, inspect configuration, and run readiness checks.",
    after_help = "Examples:\n  faqbot-cli register-commands\n  faqbot-cli doctor --json\n  faqbot-cli config"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Publish the /ask command to the configured guild and report the outcome")]
    RegisterCommands,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, Discord token readiness, and service reachability")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match load_env_file(None) {
        Err(error) => CommandResult::failure(
            "faqbot-cli",
            "env_file",
            error.to_string(),
            EXIT_CONFIG_FAILURE,
        ),
        Ok(_) => match cli.command {
            Command::RegisterCommands => commands::register::run(),
            Command::Config => commands::config::run(),
            Command::Doctor { json } => commands::doctor::run(json),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
