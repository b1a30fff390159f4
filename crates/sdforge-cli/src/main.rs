//! sdforge CLI
//!
//! Command-line interface for the structure definition compiler

use clap::{Parser, Subcommand};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "sdforge")]
#[command(about = "sdforge - Structure definition compiler", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile a tank of declarations against a definition library
    Compile(commands::compile::CompileArgs),
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile(args) => commands::compile::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
