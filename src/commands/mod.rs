use crate::diagnostics::Message;

use tamarin::{Bytecode, Program, VM};

use anstream::{eprintln, println};
use std::fs;

pub enum CommandStatus {
  /// Command was successful, no errors occurred
  Success,
  /// Command ran, but the program it was given had problems
  Failure,
}

fn read_file(filename: &str) -> Result<String, ()> {
  match fs::read_to_string(filename) {
    Ok(file) if file.is_empty() => {
      eprintln!("{}", Message::warning(format!("Empty file `{filename}`")));
      Err(())
    }
    Ok(file) => Ok(file),
    Err(_) => {
      eprintln!("{}", Message::error(format!("File not found `{filename}`")));
      Err(())
    }
  }
}

fn parse(source: &str) -> Result<Program, ()> {
  match tamarin::parse(source) {
    Ok(program) => Ok(program),
    Err(errors) => {
      for error in &errors {
        eprintln!("{}", Message::from(error));
      }
      Err(())
    }
  }
}

fn compile(program: &Program) -> Result<Bytecode, ()> {
  match tamarin::compile(program) {
    Ok(bytecode) => Ok(bytecode),
    Err(error) => {
      eprintln!("{}", Message::from(&error));
      Err(())
    }
  }
}

pub fn run(filename: &str) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;
  let program = parse(&source)?;
  let bytecode = compile(&program)?;

  let mut vm = VM::new(bytecode);
  if let Err(error) = vm.run() {
    eprintln!("{}", Message::from(&error));
    return Ok(CommandStatus::Failure);
  }

  Ok(CommandStatus::Success)
}

pub fn print_tokens(filename: &str) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;

  println!("╭─[Tokens: {filename}]");
  for token in tamarin::tokenise(&source) {
    println!("│ {} {:?}", token.kind, token.literal);
  }
  println!("╯");

  Ok(CommandStatus::Success)
}

pub fn print_ast(filename: &str) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;
  let program = parse(&source)?;

  println!("╭─[Abstract Syntax Tree: {filename}]");
  print!("{program}");
  println!("╯");

  Ok(CommandStatus::Success)
}

pub fn print_bytecode(filename: &str) -> Result<CommandStatus, ()> {
  let source = read_file(filename)?;
  let program = parse(&source)?;
  let bytecode = compile(&program)?;

  println!("╭─[Bytecode: {filename}]");
  print!("{bytecode}");
  println!("╯");

  Ok(CommandStatus::Success)
}

mod repl;
pub use repl::repl;
