//! # Tamarin
//! A small interpreted language: a single-pass bytecode compiler and a
//! stack-based virtual machine, with a REPL on top.

#![allow(clippy::print_stdout)]

mod commands;
mod diagnostics;

use clap::builder::styling::{AnsiColor, Style, Styles};
use clap::{Parser, Subcommand};
use commands::CommandStatus;
use owo_colors::OwoColorize;
use std::process;

const STYLES: Styles = Styles::styled()
  .usage(Style::new().italic())
  .header(AnsiColor::BrightYellow.on_default().bold());

fn coloured_header() -> String {
  format!(
    "{} {}",
    "Tamarin".yellow().bold(),
    format!("(v{})", env!("CARGO_PKG_VERSION")).italic().dimmed()
  )
}

fn about() -> String {
  format!(
    "{}\nA small language - a bytecode compiler and stack-based virtual machine.",
    coloured_header()
  )
}

#[derive(Parser)]
#[clap(
  name = "tamarin",
  version,
  about = about(),
  styles = STYLES,
  disable_help_subcommand = true,
)]
enum App {
  /// Runs a Tamarin program
  Run {
    /// The file to run
    file: String,
  },

  /// Start an interactive Read-Eval-Print Loop (REPL)
  Repl,

  /// Prints debugging information
  Print {
    #[command(subcommand)]
    command: PrintCommand,
  },
}

#[derive(Subcommand)]
enum PrintCommand {
  /// Displays the tokens in the file
  Tokens {
    /// The file to print
    file: String,
  },
  /// Displays the Abstract Syntax Tree
  Ast {
    /// The file to print
    file: String,
  },
  /// Displays the compiled bytecode
  Bytecode {
    /// The file to print
    file: String,
  },
}

fn main() -> process::ExitCode {
  let args = App::parse();

  let result = match args {
    App::Run { file } => commands::run(&file),
    App::Repl => commands::repl(),
    App::Print { command } => match command {
      PrintCommand::Tokens { file } => commands::print_tokens(&file),
      PrintCommand::Ast { file } => commands::print_ast(&file),
      PrintCommand::Bytecode { file } => commands::print_bytecode(&file),
    },
  };

  match result {
    Ok(CommandStatus::Success) => process::ExitCode::from(0),
    Ok(CommandStatus::Failure) => process::ExitCode::from(1),
    Err(()) => process::ExitCode::from(2),
  }
}
