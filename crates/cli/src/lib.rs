pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "harvest",
    about = "Harvest assistant operator CLI",
    long_about = "Inspect configuration, check local inference services, and run messages through the routing pipeline.",
    after_help = "Examples:\n  harvest doctor --json\n  harvest detect\n  harvest setup --gpu \"RTX 4070 12GB\"\n  harvest process \"How much for 2 kg of tomatoes?\" --inventory shop.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Validate config, local provider readiness, and cloud credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Probe known local inference services and report which are running")]
    Detect,
    #[command(about = "Print setup instructions and the recommended local model")]
    Setup {
        #[arg(long, help = "Local provider to set up (ollama or lmstudio)")]
        provider: Option<String>,
        #[arg(long, help = "GPU description used to pick a model tier, e.g. \"RTX 4090 24GB\"")]
        gpu: Option<String>,
    },
    #[command(about = "Classify the intent of a single message")]
    Classify { message: String },
    #[command(about = "Run a message through classification, extraction and response generation")]
    Process {
        message: String,
        #[arg(long, help = "JSON file with inventory, promotions and conversation context")]
        inventory: Option<PathBuf>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Detect => commands::detect::run(),
        Command::Setup { provider, gpu } => {
            commands::setup::run(provider.as_deref(), gpu.as_deref())
        }
        Command::Classify { message } => commands::classify::run(&message),
        Command::Process { message, inventory } => {
            commands::process::run(&message, inventory.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
