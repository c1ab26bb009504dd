//! # CLI Tests
//!
//! Drive the built binary against the demo programs.

use assert_cmd::Command;

fn tamarin() -> Command {
  Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

#[test]
fn run_demo_programs() {
  for demo in ["demos/fibonacci.tam", "demos/arrays.tam"] {
    let output = tamarin().args(["run", demo]).output().unwrap();

    assert!(output.status.success(), "running {demo}");
    assert!(output.stderr.is_empty(), "running {demo}");
  }
}

#[test]
fn run_missing_file() {
  let output = tamarin().args(["run", "demos/missing.tam"]).output().unwrap();

  assert_eq!(output.status.code(), Some(2));
  assert!(!output.stderr.is_empty());
}

#[test]
fn print_tokens() {
  let output = tamarin()
    .args(["print", "tokens", "demos/fibonacci.tam"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let stdout = String::from_utf8(output.stdout).unwrap();
  assert!(stdout.contains("Tokens: demos/fibonacci.tam"));
  assert!(stdout.contains("Let \"let\""));
  assert!(stdout.contains("Identifier \"fibonacci\""));
  assert!(stdout.contains("LessEqual \"<=\""));
}

#[test]
fn print_ast() {
  let output = tamarin()
    .args(["print", "ast", "demos/fibonacci.tam"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let stdout = String::from_utf8(output.stdout).unwrap();
  assert!(stdout.contains("let fibonacci = fn(x)"));
  assert!(stdout.contains("(x <= 1)"));
}

#[test]
fn print_bytecode() {
  let output = tamarin()
    .args(["print", "bytecode", "demos/fibonacci.tam"])
    .output()
    .unwrap();

  assert!(output.status.success());
  let stdout = String::from_utf8(output.stdout).unwrap();

  // the top level builds the closure and binds the global
  assert!(stdout.contains("Closure 3 0"));
  assert!(stdout.contains("SetGlobal 0"));
  // the function's instructions are listed as a constant
  assert!(stdout.contains("Constant 3 <function>:"));
  assert!(stdout.contains("GreaterEqual"));
}

#[test]
fn print_bytecode_of_invalid_source_fails() {
  let output = tamarin()
    .args(["print", "bytecode", "demos/missing.tam"])
    .output()
    .unwrap();

  assert_eq!(output.status.code(), Some(2));
}
