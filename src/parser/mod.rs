//! # Parser
//! A Pratt parser, turning a stream of tokens into an abstract syntax tree.

mod tokeniser;

pub use tokeniser::{tokenise, Token, TokenKind};

use crate::ast::{
  Block, Expression, InfixOperator, PrefixOperator, Program, Statement,
};
use std::{error, fmt};

/// Parses a source code string into a [Program]
///
/// # Errors
/// Returns the list of syntax errors found, if any. A program which produced
/// errors is never handed to the compiler.
pub fn parse(source: &str) -> Result<Program, Vec<ParseError>> {
  Parser::new(source).parse()
}

/// The binding power of an operator, in increasing order
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
  Lowest,
  Equality,
  Comparison,
  Sum,
  Product,
  Prefix,
  Call,
  Index,
}
impl Precedence {
  fn of(kind: TokenKind) -> Self {
    match kind {
      TokenKind::EqualEqual | TokenKind::BangEqual => Self::Equality,
      TokenKind::Less
      | TokenKind::Greater
      | TokenKind::LessEqual
      | TokenKind::GreaterEqual => Self::Comparison,
      TokenKind::Plus | TokenKind::Minus => Self::Sum,
      TokenKind::Star | TokenKind::Slash | TokenKind::Percent => Self::Product,
      TokenKind::LeftParen => Self::Call,
      TokenKind::LeftSquare => Self::Index,
      _ => Self::Lowest,
    }
  }
}

struct Parser<'source> {
  tokens: Vec<Token<'source>>,
  position: usize,
  errors: Vec<ParseError>,
}
impl<'source> Parser<'source> {
  fn new(source: &'source str) -> Self {
    Self {
      tokens: tokenise(source).collect(),
      position: 0,
      errors: Vec::new(),
    }
  }

  fn parse(mut self) -> Result<Program, Vec<ParseError>> {
    let mut program = Program::default();

    while !self.is_finished() {
      match self.parse_statement() {
        Ok(statement) => program.statements.push(statement),
        Err(error) => {
          self.errors.push(error);
          self.resync();
        }
      }
      self.skip_semicolons();
    }

    if self.errors.is_empty() {
      Ok(program)
    } else {
      Err(self.errors)
    }
  }

  fn is_finished(&self) -> bool {
    self.position >= self.tokens.len()
  }

  fn current(&self) -> Option<Token<'source>> {
    self.tokens.get(self.position).copied()
  }
  fn current_kind(&self) -> Option<TokenKind> {
    self.current().map(|token| token.kind)
  }
  fn peek_kind(&self) -> Option<TokenKind> {
    self.tokens.get(self.position + 1).map(|token| token.kind)
  }

  fn advance(&mut self) -> Option<Token<'source>> {
    let token = self.current();
    self.position += 1;
    token
  }

  fn matches(&mut self, kind: TokenKind) -> bool {
    if self.current_kind() == Some(kind) {
      self.position += 1;
      true
    } else {
      false
    }
  }

  fn expect(&mut self, kind: TokenKind) -> Result<Token<'source>, ParseError> {
    match self.current() {
      Some(token) if token.kind == kind => {
        self.position += 1;
        Ok(token)
      }
      token => Err(ParseError::Expected {
        expected: kind,
        got: token.map(|token| token.literal.to_owned()),
      }),
    }
  }

  /// Skip forwards to the next statement boundary, so a single syntax error
  /// doesn't cascade into reports about everything which follows it
  fn resync(&mut self) {
    while let Some(kind) = self.current_kind() {
      self.position += 1;
      if kind == TokenKind::Semicolon {
        break;
      }
    }
  }

  fn skip_semicolons(&mut self) {
    while self.matches(TokenKind::Semicolon) {}
  }

  fn parse_statement(&mut self) -> Result<Statement, ParseError> {
    match self.current_kind() {
      Some(TokenKind::Let) => self.parse_let_statement(),
      Some(TokenKind::Return) => self.parse_return_statement(),
      _ => {
        let expression = self.parse_expression(Precedence::Lowest)?;
        Ok(Statement::Expression { expression })
      }
    }
  }

  fn parse_let_statement(&mut self) -> Result<Statement, ParseError> {
    self.expect(TokenKind::Let)?;
    let name = self.expect(TokenKind::Identifier)?.literal.to_owned();
    self.expect(TokenKind::Equal)?;
    let value = self.parse_expression(Precedence::Lowest)?;

    Ok(Statement::Let { name, value })
  }

  fn parse_return_statement(&mut self) -> Result<Statement, ParseError> {
    self.expect(TokenKind::Return)?;
    let value = self.parse_expression(Precedence::Lowest)?;

    Ok(Statement::Return { value })
  }

  fn parse_expression(&mut self, precedence: Precedence) -> Result<Expression, ParseError> {
    let mut expression = self.parse_prefix()?;

    while let Some(kind) = self.current_kind() {
      if kind == TokenKind::Semicolon || precedence >= Precedence::of(kind) {
        break;
      }
      expression = self.parse_infix(expression)?;
    }

    Ok(expression)
  }

  fn parse_prefix(&mut self) -> Result<Expression, ParseError> {
    let Some(token) = self.advance() else {
      return Err(ParseError::ExpectedExpression(None));
    };

    match token.kind {
      TokenKind::Integer => {
        let value = token
          .literal
          .parse()
          .map_err(|_| ParseError::IntegerTooLarge(token.literal.to_owned()))?;
        Ok(Expression::Integer(value))
      }
      TokenKind::String => {
        let contents = &token.literal[1..token.literal.len() - 1];
        Ok(Expression::String(contents.to_owned()))
      }
      TokenKind::True => Ok(Expression::Boolean(true)),
      TokenKind::False => Ok(Expression::Boolean(false)),
      TokenKind::Identifier => Ok(Expression::Identifier(token.literal.to_owned())),
      TokenKind::Bang => self.parse_prefix_operator(PrefixOperator::Not),
      TokenKind::Minus => self.parse_prefix_operator(PrefixOperator::Minus),
      TokenKind::LeftParen => {
        let expression = self.parse_expression(Precedence::Lowest)?;
        self.expect(TokenKind::RightParen)?;
        Ok(expression)
      }
      TokenKind::If => self.parse_if_expression(),
      TokenKind::Fn => self.parse_function_literal(),
      TokenKind::LeftSquare => {
        let elements = self.parse_expression_list(TokenKind::RightSquare)?;
        Ok(Expression::Array { elements })
      }
      TokenKind::LeftCurly => self.parse_hash_literal(),
      TokenKind::UnterminatedString => Err(ParseError::UnterminatedString),
      _ => Err(ParseError::ExpectedExpression(Some(
        token.literal.to_owned(),
      ))),
    }
  }

  fn parse_prefix_operator(&mut self, operator: PrefixOperator) -> Result<Expression, ParseError> {
    let right = self.parse_expression(Precedence::Prefix)?;
    Ok(Expression::Prefix {
      operator,
      right: Box::new(right),
    })
  }

  fn parse_infix(&mut self, left: Expression) -> Result<Expression, ParseError> {
    let token = self.advance().expect("checked by parse_expression");

    let operator = match token.kind {
      TokenKind::Plus => InfixOperator::Add,
      TokenKind::Minus => InfixOperator::Subtract,
      TokenKind::Star => InfixOperator::Multiply,
      TokenKind::Slash => InfixOperator::Divide,
      TokenKind::Percent => InfixOperator::Remainder,
      TokenKind::EqualEqual => InfixOperator::Equal,
      TokenKind::BangEqual => InfixOperator::NotEqual,
      TokenKind::Less => InfixOperator::Less,
      TokenKind::Greater => InfixOperator::Greater,
      TokenKind::LessEqual => InfixOperator::LessEqual,
      TokenKind::GreaterEqual => InfixOperator::GreaterEqual,

      TokenKind::LeftParen => {
        let arguments = self.parse_expression_list(TokenKind::RightParen)?;
        return Ok(Expression::Call {
          function: Box::new(left),
          arguments,
        });
      }
      TokenKind::LeftSquare => {
        let index = self.parse_expression(Precedence::Lowest)?;
        self.expect(TokenKind::RightSquare)?;
        return Ok(Expression::Index {
          left: Box::new(left),
          index: Box::new(index),
        });
      }
      _ => unreachable!("only infix tokens have a precedence"),
    };

    let right = self.parse_expression(Precedence::of(token.kind))?;
    Ok(Expression::Infix {
      operator,
      left: Box::new(left),
      right: Box::new(right),
    })
  }

  fn parse_if_expression(&mut self) -> Result<Expression, ParseError> {
    self.expect(TokenKind::LeftParen)?;
    let condition = self.parse_expression(Precedence::Lowest)?;
    self.expect(TokenKind::RightParen)?;
    let consequence = self.parse_block()?;

    let alternative = if self.matches(TokenKind::Else) {
      Some(self.parse_block()?)
    } else {
      None
    };

    Ok(Expression::If {
      condition: Box::new(condition),
      consequence,
      alternative,
    })
  }

  fn parse_function_literal(&mut self) -> Result<Expression, ParseError> {
    self.expect(TokenKind::LeftParen)?;

    let mut parameters = Vec::new();
    if !self.matches(TokenKind::RightParen) {
      loop {
        let parameter = self.expect(TokenKind::Identifier)?;
        parameters.push(parameter.literal.to_owned());

        if !self.matches(TokenKind::Comma) {
          break;
        }
      }
      self.expect(TokenKind::RightParen)?;
    }

    let body = self.parse_block()?;
    Ok(Expression::Function { parameters, body })
  }

  fn parse_block(&mut self) -> Result<Block, ParseError> {
    self.expect(TokenKind::LeftCurly)?;

    let mut statements = Vec::new();
    while self.current_kind() != Some(TokenKind::RightCurly) {
      if self.is_finished() {
        return Err(ParseError::Expected {
          expected: TokenKind::RightCurly,
          got: None,
        });
      }
      statements.push(self.parse_statement()?);
      self.skip_semicolons();
    }
    self.expect(TokenKind::RightCurly)?;

    Ok(Block { statements })
  }

  fn parse_expression_list(&mut self, end: TokenKind) -> Result<Vec<Expression>, ParseError> {
    let mut items = Vec::new();

    if self.matches(end) {
      return Ok(items);
    }

    loop {
      items.push(self.parse_expression(Precedence::Lowest)?);
      if !self.matches(TokenKind::Comma) {
        break;
      }
    }
    self.expect(end)?;

    Ok(items)
  }

  fn parse_hash_literal(&mut self) -> Result<Expression, ParseError> {
    let mut pairs = Vec::new();

    if self.matches(TokenKind::RightCurly) {
      return Ok(Expression::Hash { pairs });
    }

    loop {
      let key = self.parse_expression(Precedence::Lowest)?;
      self.expect(TokenKind::Colon)?;
      let value = self.parse_expression(Precedence::Lowest)?;
      pairs.push((key, value));

      if !self.matches(TokenKind::Comma) {
        break;
      }
    }
    self.expect(TokenKind::RightCurly)?;

    Ok(Expression::Hash { pairs })
  }
}

/// An error from parsing source code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
  /// A specific token was expected but something else was found
  Expected {
    expected: TokenKind,
    got: Option<String>,
  },
  /// An expression was expected but something else was found
  ExpectedExpression(Option<String>),
  /// An integer literal which doesn't fit in 64 bits
  IntegerTooLarge(String),
  /// A string literal with no closing quote
  UnterminatedString,
}
impl ParseError {
  /// The title of the error message
  #[must_use]
  pub fn title(&self) -> &'static str {
    match self {
      Self::Expected { .. } => "Unexpected Token",
      Self::ExpectedExpression(_) => "Expected Expression",
      Self::IntegerTooLarge(_) => "Integer Too Large",
      Self::UnterminatedString => "Unterminated String",
    }
  }

  /// The body of the error message describing what has gone wrong
  #[must_use]
  pub fn message(&self) -> String {
    match self {
      Self::Expected { expected, got } => match got {
        Some(got) => format!("expected {expected}, got `{got}`"),
        None => format!("expected {expected}, got the end of the input"),
      },
      Self::ExpectedExpression(got) => match got {
        Some(got) => format!("expected an expression, got `{got}`"),
        None => "expected an expression, got the end of the input".into(),
      },
      Self::IntegerTooLarge(literal) => {
        format!("`{literal}` doesn't fit in a 64 bit integer")
      }
      Self::UnterminatedString => "missing the closing `\"` of a string".into(),
    }
  }
}
impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message())
  }
}
impl error::Error for ParseError {}
