use super::CommandStatus;
use crate::diagnostics::Message;

use tamarin::{Compiler, SymbolTable, Value, GLOBALS_SIZE, VM};

use anstream::{eprintln, println};
use owo_colors::OwoColorize;

/// The state a REPL session accumulates across inputs.
///
/// Compile state (the symbol table and constant pool) is only committed when
/// a line compiles, so a failed line leaves the session exactly as it was.
/// Globals survive runtime errors, as in a single long-running program.
struct Session {
  symbols: SymbolTable,
  constants: Vec<Value>,
  globals: Vec<Value>,
}
impl Session {
  fn new() -> Self {
    Self {
      symbols: SymbolTable::global(),
      constants: Vec::new(),
      globals: vec![Value::Null; GLOBALS_SIZE],
    }
  }

  fn run_line(&mut self, line: &str) {
    let program = match tamarin::parse(line) {
      Ok(program) => program,
      Err(errors) => {
        for error in &errors {
          eprintln!("{}", Message::from(error));
        }
        return;
      }
    };

    let compiler = Compiler::with_state(self.symbols.clone(), self.constants.clone());
    let (bytecode, symbols) = match compiler.compile(&program) {
      Ok(compiled) => compiled,
      Err(error) => {
        eprintln!("{}", Message::from(&error));
        return;
      }
    };
    self.symbols = symbols;
    self.constants = bytecode.constants.clone();

    let globals = std::mem::take(&mut self.globals);
    let mut vm = VM::with_globals(bytecode, globals);
    let result = vm.run();
    let output = vm.last_popped().to_string();
    self.globals = vm.into_globals();

    match result {
      Ok(()) => println!("{output}"),
      Err(error) => eprintln!("{}", Message::from(&error)),
    }
  }
}

pub fn repl() -> Result<CommandStatus, ()> {
  println!("{}", crate::coloured_header());
  println!("{}", "exit using ctrl+d, ctrl+c, or `exit`".dimmed());

  let mut editor = rustyline::DefaultEditor::new().map_err(|_| ())?;
  let mut session = Session::new();

  while let Ok(line) = editor.readline(">> ") {
    if line.trim() == "exit" {
      break;
    }
    if line.trim().is_empty() {
      continue;
    }

    let _ = editor.add_history_entry(line.as_str());
    session.run_line(&line);
  }

  Ok(CommandStatus::Success)
}
