//! Display implementations which reproduce source-like text.
//!
//! The compiler relies on this rendering being deterministic: hash literal
//! pairs are ordered by the printed form of their key expression.

use super::{Block, Expression, InfixOperator, PrefixOperator, Program, Statement};
use std::fmt;

impl fmt::Display for Program {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for statement in &self.statements {
      writeln!(f, "{statement}")?;
    }
    Ok(())
  }
}

impl fmt::Display for Statement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Let { name, value } => write!(f, "let {name} = {value};"),
      Self::Return { value } => write!(f, "return {value};"),
      Self::Expression { expression } => write!(f, "{expression}"),
    }
  }
}

impl fmt::Display for Block {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{{ ")?;
    for statement in &self.statements {
      write!(f, "{statement} ")?;
    }
    write!(f, "}}")
  }
}

impl fmt::Display for Expression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Integer(value) => write!(f, "{value}"),
      Self::String(value) => write!(f, "\"{value}\""),
      Self::Boolean(value) => write!(f, "{value}"),
      Self::Identifier(name) => write!(f, "{name}"),
      Self::Prefix { operator, right } => write!(f, "({operator}{right})"),
      Self::Infix {
        operator,
        left,
        right,
      } => write!(f, "({left} {operator} {right})"),
      Self::If {
        condition,
        consequence,
        alternative,
      } => {
        write!(f, "if {condition} {consequence}")?;
        if let Some(alternative) = alternative {
          write!(f, " else {alternative}")?;
        }
        Ok(())
      }
      Self::Function { parameters, body } => {
        write!(f, "fn({}) {body}", parameters.join(", "))
      }
      Self::Call {
        function,
        arguments,
      } => {
        let arguments: Vec<String> = arguments.iter().map(ToString::to_string).collect();
        write!(f, "{function}({})", arguments.join(", "))
      }
      Self::Index { left, index } => write!(f, "({left}[{index}])"),
      Self::Array { elements } => {
        let elements: Vec<String> = elements.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", elements.join(", "))
      }
      Self::Hash { pairs } => {
        let pairs: Vec<String> = pairs
          .iter()
          .map(|(key, value)| format!("{key}: {value}"))
          .collect();
        write!(f, "{{{}}}", pairs.join(", "))
      }
    }
  }
}

impl fmt::Display for PrefixOperator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Not => write!(f, "!"),
      Self::Minus => write!(f, "-"),
    }
  }
}

impl fmt::Display for InfixOperator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let symbol = match self {
      Self::Add => "+",
      Self::Subtract => "-",
      Self::Multiply => "*",
      Self::Divide => "/",
      Self::Remainder => "%",
      Self::Equal => "==",
      Self::NotEqual => "!=",
      Self::Less => "<",
      Self::Greater => ">",
      Self::LessEqual => "<=",
      Self::GreaterEqual => ">=",
    };
    write!(f, "{symbol}")
  }
}
