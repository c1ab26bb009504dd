//! # Tamarin
//! A small interpreted language: source code is parsed into a syntax tree,
//! compiled in a single pass into bytecode, and executed by a stack-based
//! virtual machine.

pub mod ast;
mod interpreter;
mod parser;

#[doc(inline)]
pub use ast::Program;

/// Parses a source code string into a [Program]
///
/// # Examples
/// ```
/// let program = tamarin::parse("5 + 3").unwrap();
/// ```
///
/// # Errors
/// If the syntax of the source is invalid, all the problems found.
pub fn parse(source: &str) -> Result<Program, Vec<ParseError>> {
  parser::parse(source)
}
pub use parser::{tokenise, ParseError, Token, TokenKind};

/// Compile a parsed [Program] into [Bytecode] for the virtual machine
///
/// # Examples
/// ```
/// let program = tamarin::parse("5 + 3").unwrap();
/// let bytecode = tamarin::compile(&program).unwrap();
/// ```
///
/// # Errors
/// If an identifier doesn't resolve, or the program is too big for the
/// operand widths of the instruction format.
pub fn compile(program: &Program) -> Result<Bytecode, CompileError> {
  interpreter::compile(program)
}
pub use interpreter::{
  Bytecode, CompileError, Compiler, Instructions, OpCode, RuntimeError, SymbolTable, Value,
  GLOBALS_SIZE, VM,
};
