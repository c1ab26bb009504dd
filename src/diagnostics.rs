use owo_colors::OwoColorize;
use std::fmt;
use tamarin::{CompileError, ParseError, RuntimeError};

#[derive(Debug)]
pub enum Severity {
  Error,
  Warning,
}

/// A problem to report to the user
pub struct Message {
  pub title: String,
  pub body: String,
  pub severity: Severity,
}
impl Message {
  pub fn error(message: String) -> Self {
    Self {
      title: message,
      body: String::new(),
      severity: Severity::Error,
    }
  }
  pub fn warning(message: String) -> Self {
    Self {
      title: message,
      body: String::new(),
      severity: Severity::Warning,
    }
  }
}
impl fmt::Display for Message {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.severity {
      Severity::Error => write!(f, "{}", "✕ Error".bold().red()),
      Severity::Warning => write!(f, "{}", "⚠ Warning".bold().yellow()),
    }?;
    writeln!(f, "{} {}", ":".bold(), &self.title.bold())?;

    if !self.body.is_empty() {
      writeln!(f, "{}", &self.body)?;
    }

    Ok(())
  }
}
impl From<&ParseError> for Message {
  fn from(error: &ParseError) -> Self {
    Self {
      title: error.title().to_owned(),
      body: error.message(),
      severity: Severity::Error,
    }
  }
}
impl From<&CompileError> for Message {
  fn from(error: &CompileError) -> Self {
    Self {
      title: error.title().to_owned(),
      body: error.message(),
      severity: Severity::Error,
    }
  }
}
impl From<&RuntimeError> for Message {
  fn from(error: &RuntimeError) -> Self {
    Self {
      title: error.title().to_owned(),
      body: error.message(),
      severity: Severity::Error,
    }
  }
}
