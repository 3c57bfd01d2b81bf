use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "coliseum-cli", version, about = "Coliseum CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Leaderboards over recorded history
    Board {
        #[command(subcommand)]
        action: commands::board::BoardAction,
    },
    /// Persistent data inspection
    Data {
        #[command(subcommand)]
        action: commands::data::DataAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Replay an event log as one attempt
    Replay {
        /// Path to a JSONL event log
        file: std::path::PathBuf,
        /// Discard the attempt record instead of appending it to history
        #[arg(long)]
        no_save: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Board { action } => commands::board::run(action),
        Commands::Data { action } => commands::data::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Replay { file, no_save } => commands::replay::run(&file, no_save),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
