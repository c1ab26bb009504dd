use super::{
  bytecode::{make, Instructions, OpCode},
  symbol_table::{Symbol, SymbolScope, SymbolTable},
  value::{CompiledFunction, Value},
};
use crate::ast::{Block, Expression, InfixOperator, PrefixOperator, Program, Statement};
use std::{error, fmt, mem, rc::Rc};

/// The output of compilation: a block of instructions and the constant pool
/// they index into
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Bytecode {
  pub instructions: Instructions,
  pub constants: Vec<Value>,
}
impl fmt::Display for Bytecode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.instructions)?;

    for (index, constant) in self.constants.iter().enumerate() {
      if let Value::Function(function) = constant {
        writeln!(f, "\nConstant {index} <function>:")?;
        write!(f, "{}", function.instructions)?;
      }
    }

    Ok(())
  }
}

/// Operand placeholder for jumps which are patched once the target is known
const PLACEHOLDER: usize = u16::MAX as usize;

#[derive(Copy, Clone, Debug)]
struct EmittedInstruction {
  opcode: OpCode,
  position: usize,
}

/// The instruction buffer for one function being compiled, along with the
/// last two emitted instructions (needed for pop-elision and rewriting a
/// trailing pop into a return)
#[derive(Debug, Default)]
struct CompilationScope {
  instructions: Instructions,
  last_instruction: Option<EmittedInstruction>,
  previous_instruction: Option<EmittedInstruction>,
}

/// Compiles an abstract syntax tree into [Bytecode]
pub struct Compiler {
  constants: Vec<Value>,
  symbols: SymbolTable,
  scopes: Vec<CompilationScope>,
}
impl Compiler {
  /// Create a new compiler, with the built-in functions known
  #[must_use]
  pub fn new() -> Self {
    Self::with_state(SymbolTable::global(), Vec::new())
  }

  /// Create a compiler continuing from an existing symbol table and constant
  /// pool, so a REPL can accumulate definitions across inputs
  #[must_use]
  pub fn with_state(symbols: SymbolTable, constants: Vec<Value>) -> Self {
    Self {
      constants,
      symbols,
      scopes: vec![CompilationScope::default()],
    }
  }

  /// Compile a program, returning its bytecode and the updated symbol table
  ///
  /// # Errors
  /// If an identifier doesn't resolve, or the program is too big for the
  /// operand widths of the instruction format
  pub fn compile(mut self, program: &Program) -> Result<(Bytecode, SymbolTable), CompileError> {
    program.compile(&mut self)?;

    let scope = self.scopes.pop().expect("main scope always exists");
    let bytecode = Bytecode {
      instructions: scope.instructions,
      constants: self.constants,
    };

    Ok((bytecode, self.symbols))
  }

  fn scope(&self) -> &CompilationScope {
    self.scopes.last().expect("scope stack is never empty")
  }
  fn scope_mut(&mut self) -> &mut CompilationScope {
    self.scopes.last_mut().expect("scope stack is never empty")
  }

  fn emit(&mut self, op: OpCode, operands: &[usize]) -> usize {
    let instruction = make(op, operands);
    let scope = self.scope_mut();

    let position = scope.instructions.push(&instruction);
    scope.previous_instruction = scope.last_instruction;
    scope.last_instruction = Some(EmittedInstruction {
      opcode: op,
      position,
    });

    position
  }

  fn add_constant(&mut self, value: Value) -> Result<usize, CompileError> {
    let index = self.constants.len();
    if index > u16::MAX as usize {
      return Err(CompileError::TooManyConstants);
    }

    self.constants.push(value);
    Ok(index)
  }

  fn emit_constant(&mut self, value: Value) -> Result<(), CompileError> {
    let index = self.add_constant(value)?;
    self.emit(OpCode::Constant, &[index]);
    Ok(())
  }

  fn last_instruction_is(&self, op: OpCode) -> bool {
    match self.scope().last_instruction {
      Some(last) => last.opcode == op,
      None => false,
    }
  }

  /// Remove a trailing pop, so the branch of a conditional leaves its value
  /// on the stack
  fn remove_last_pop(&mut self) {
    let scope = self.scope_mut();
    let last = scope.last_instruction.expect("pop was just emitted");

    scope.instructions.truncate(last.position);
    scope.last_instruction = scope.previous_instruction.take();
  }

  /// Rewrite a trailing pop into a return, making the final expression of a
  /// function body its return value
  fn replace_last_pop_with_return(&mut self) {
    let scope = self.scope_mut();
    let last = scope.last_instruction.as_mut().expect("pop was just emitted");

    let position = last.position;
    last.opcode = OpCode::ReturnValue;
    scope
      .instructions
      .replace(position, &make(OpCode::ReturnValue, &[]));
  }

  /// Re-encode the operand of the instruction at `position`
  fn change_operand(&mut self, position: usize, operand: usize) -> Result<(), CompileError> {
    if operand > u16::MAX as usize {
      return Err(CompileError::TooBigJump);
    }

    let op = OpCode::from(self.scope().instructions.byte(position));
    let instruction = make(op, &[operand]);
    self.scope_mut().instructions.replace(position, &instruction);

    Ok(())
  }

  /// Point the jump at `position` to the current end of the instructions
  fn patch_jump(&mut self, position: usize) -> Result<(), CompileError> {
    let target = self.scope().instructions.len();
    self.change_operand(position, target)
  }

  fn enter_scope(&mut self) {
    self.scopes.push(CompilationScope::default());

    let outer = mem::take(&mut self.symbols);
    self.symbols = SymbolTable::enclosing(outer);
  }

  fn leave_scope(&mut self) -> Instructions {
    let scope = self.scopes.pop().expect("only left after being entered");
    let symbols = mem::take(&mut self.symbols);
    self.symbols = symbols.into_outer().expect("only left after being entered");

    scope.instructions
  }

  /// Emit the load instruction for a resolved symbol
  fn load_symbol(&mut self, symbol: &Symbol) -> Result<(), CompileError> {
    match symbol.scope {
      SymbolScope::Global => {
        if symbol.index > u16::MAX as usize {
          return Err(CompileError::TooManyGlobals);
        }
        self.emit(OpCode::GetGlobal, &[symbol.index]);
      }
      SymbolScope::Local => {
        if symbol.index > u8::MAX as usize {
          return Err(CompileError::TooManyLocals);
        }
        self.emit(OpCode::GetLocal, &[symbol.index]);
      }
      SymbolScope::Builtin => {
        self.emit(OpCode::GetBuiltin, &[symbol.index]);
      }
      SymbolScope::Free => {
        if symbol.index > u8::MAX as usize {
          return Err(CompileError::TooManyFreeVariables);
        }
        self.emit(OpCode::GetFree, &[symbol.index]);
      }
    }

    Ok(())
  }
}
impl Default for Compiler {
  fn default() -> Self {
    Self::new()
  }
}

trait Compile {
  fn compile(&self, compiler: &mut Compiler) -> Result<(), CompileError>;
}

impl Compile for Program {
  fn compile(&self, compiler: &mut Compiler) -> Result<(), CompileError> {
    for statement in &self.statements {
      statement.compile(compiler)?;
    }
    Ok(())
  }
}

impl Compile for Statement {
  fn compile(&self, compiler: &mut Compiler) -> Result<(), CompileError> {
    match self {
      Statement::Let { name, value } => {
        // the name is defined before its value is compiled, so a function
        // may refer to itself
        let symbol = compiler.symbols.define(name);
        value.compile(compiler)?;

        match symbol.scope {
          SymbolScope::Global => {
            if symbol.index > u16::MAX as usize {
              return Err(CompileError::TooManyGlobals);
            }
            compiler.emit(OpCode::SetGlobal, &[symbol.index]);
          }
          SymbolScope::Local => {
            if symbol.index > u8::MAX as usize {
              return Err(CompileError::TooManyLocals);
            }
            compiler.emit(OpCode::SetLocal, &[symbol.index]);
          }
          SymbolScope::Builtin | SymbolScope::Free => {
            unreachable!("define only produces globals and locals")
          }
        }
        Ok(())
      }
      Statement::Return { value } => {
        value.compile(compiler)?;
        compiler.emit(OpCode::ReturnValue, &[]);
        Ok(())
      }
      Statement::Expression { expression } => {
        expression.compile(compiler)?;
        compiler.emit(OpCode::Pop, &[]);
        Ok(())
      }
    }
  }
}

impl Compile for Block {
  fn compile(&self, compiler: &mut Compiler) -> Result<(), CompileError> {
    for statement in &self.statements {
      statement.compile(compiler)?;
    }
    Ok(())
  }
}

impl Compile for Expression {
  fn compile(&self, compiler: &mut Compiler) -> Result<(), CompileError> {
    match self {
      Expression::Integer(value) => compiler.emit_constant(Value::Integer(*value)),
      Expression::String(value) => compiler.emit_constant(Value::from(value.as_str())),
      Expression::Boolean(true) => {
        compiler.emit(OpCode::True, &[]);
        Ok(())
      }
      Expression::Boolean(false) => {
        compiler.emit(OpCode::False, &[]);
        Ok(())
      }
      Expression::Identifier(name) => {
        let symbol = compiler
          .symbols
          .resolve(name)
          .ok_or_else(|| CompileError::UndefinedVariable(name.clone()))?;
        compiler.load_symbol(&symbol)
      }
      Expression::Prefix { operator, right } => {
        right.compile(compiler)?;
        match operator {
          PrefixOperator::Not => compiler.emit(OpCode::Not, &[]),
          PrefixOperator::Minus => compiler.emit(OpCode::Negate, &[]),
        };
        Ok(())
      }
      Expression::Infix {
        operator,
        left,
        right,
      } => {
        // `<` and `<=` are compiled with their operands swapped, so the
        // virtual machine only knows greater-than comparisons
        if let InfixOperator::Less | InfixOperator::LessEqual = operator {
          right.compile(compiler)?;
          left.compile(compiler)?;
          compiler.emit(
            match operator {
              InfixOperator::Less => OpCode::Greater,
              _ => OpCode::GreaterEqual,
            },
            &[],
          );
          return Ok(());
        }

        left.compile(compiler)?;
        right.compile(compiler)?;
        compiler.emit(
          match operator {
            InfixOperator::Add => OpCode::Add,
            InfixOperator::Subtract => OpCode::Subtract,
            InfixOperator::Multiply => OpCode::Multiply,
            InfixOperator::Divide => OpCode::Divide,
            InfixOperator::Remainder => OpCode::Remainder,
            InfixOperator::Equal => OpCode::Equal,
            InfixOperator::NotEqual => OpCode::NotEqual,
            InfixOperator::Greater => OpCode::Greater,
            InfixOperator::GreaterEqual => OpCode::GreaterEqual,
            InfixOperator::Less | InfixOperator::LessEqual => unreachable!("handled above"),
          },
          &[],
        );
        Ok(())
      }
      Expression::If {
        condition,
        consequence,
        alternative,
      } => {
        condition.compile(compiler)?;
        let jump_if_false = compiler.emit(OpCode::JumpIfFalse, &[PLACEHOLDER]);

        consequence.compile(compiler)?;
        if compiler.last_instruction_is(OpCode::Pop) {
          compiler.remove_last_pop();
        }
        let jump_to_end = compiler.emit(OpCode::Jump, &[PLACEHOLDER]);

        compiler.patch_jump(jump_if_false)?;
        match alternative {
          None => {
            compiler.emit(OpCode::Null, &[]);
          }
          Some(alternative) => {
            alternative.compile(compiler)?;
            if compiler.last_instruction_is(OpCode::Pop) {
              compiler.remove_last_pop();
            }
          }
        }
        compiler.patch_jump(jump_to_end)
      }
      Expression::Function { parameters, body } => {
        compiler.enter_scope();
        for parameter in parameters {
          compiler.symbols.define(parameter);
        }

        body.compile(compiler)?;
        if compiler.last_instruction_is(OpCode::Pop) {
          compiler.replace_last_pop_with_return();
        }
        if !compiler.last_instruction_is(OpCode::ReturnValue) {
          compiler.emit(OpCode::Return, &[]);
        }

        let free_symbols = compiler.symbols.free_symbols().to_vec();
        let num_locals = compiler.symbols.num_definitions();
        let instructions = compiler.leave_scope();

        // push the captured values, in capture order, for the closure to take
        for free in &free_symbols {
          compiler.load_symbol(free)?;
        }
        if free_symbols.len() > u8::MAX as usize {
          return Err(CompileError::TooManyFreeVariables);
        }

        let function = CompiledFunction {
          instructions,
          num_locals,
          num_params: parameters.len(),
        };
        let constant = compiler.add_constant(Value::Function(Rc::new(function)))?;
        compiler.emit(OpCode::Closure, &[constant, free_symbols.len()]);
        Ok(())
      }
      Expression::Call {
        function,
        arguments,
      } => {
        function.compile(compiler)?;
        for argument in arguments {
          argument.compile(compiler)?;
        }

        if arguments.len() > u8::MAX as usize {
          return Err(CompileError::TooManyArguments);
        }
        compiler.emit(OpCode::Call, &[arguments.len()]);
        Ok(())
      }
      Expression::Index { left, index } => {
        left.compile(compiler)?;
        index.compile(compiler)?;
        compiler.emit(OpCode::Index, &[]);
        Ok(())
      }
      Expression::Array { elements } => {
        for element in elements {
          element.compile(compiler)?;
        }

        if elements.len() > u16::MAX as usize {
          return Err(CompileError::TooManyElements);
        }
        compiler.emit(OpCode::Array, &[elements.len()]);
        Ok(())
      }
      Expression::Hash { pairs } => {
        // the parser delivers pairs in source order; sort by the printed
        // form of the key so the emitted bytecode is deterministic
        let mut pairs: Vec<&(Expression, Expression)> = pairs.iter().collect();
        pairs.sort_by_cached_key(|pair| pair.0.to_string());

        let length = pairs.len() * 2;
        for (key, value) in pairs {
          key.compile(compiler)?;
          value.compile(compiler)?;
        }

        if length > u16::MAX as usize {
          return Err(CompileError::TooManyElements);
        }
        compiler.emit(OpCode::Hash, &[length]);
        Ok(())
      }
    }
  }
}

/// An error from compiling an AST into bytecode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
  /// An identifier which doesn't resolve in any visible scope
  UndefinedVariable(String),
  /// Too many constants
  TooManyConstants,
  /// Too many global bindings
  TooManyGlobals,
  /// Too many local bindings in one function
  TooManyLocals,
  /// Too many captured variables in one closure
  TooManyFreeVariables,
  /// Too many arguments in one call
  TooManyArguments,
  /// Too many elements in one array or hashmap literal
  TooManyElements,
  /// A jump further than the operand can encode
  TooBigJump,
}
impl CompileError {
  /// The title of the error message
  #[must_use]
  pub fn title(&self) -> &'static str {
    match self {
      Self::UndefinedVariable(_) => "Undefined Variable",
      Self::TooManyConstants => "Too Many Constants",
      Self::TooManyGlobals => "Too Many Globals",
      Self::TooManyLocals => "Too Many Locals",
      Self::TooManyFreeVariables => "Too Many Free Variables",
      Self::TooManyArguments => "Too Many Arguments",
      Self::TooManyElements => "Too Many Elements",
      Self::TooBigJump => "Too Big Jump",
    }
  }

  /// The body of the error message describing what has gone wrong
  #[must_use]
  pub fn message(&self) -> String {
    match self {
      Self::UndefinedVariable(name) => format!("variable `{name}` is not defined"),
      Self::TooManyConstants => "the maximum no. of constants has been reached (65536)".into(),
      Self::TooManyGlobals => "the maximum no. of globals has been reached (65536)".into(),
      Self::TooManyLocals => "more than 256 locals have been defined in a function".into(),
      Self::TooManyFreeVariables => "a closure captures more than 256 variables".into(),
      Self::TooManyArguments => "a call passes more than 256 arguments".into(),
      Self::TooManyElements => "a literal holds more than 65536 elements".into(),
      Self::TooBigJump => "the maximum jump size has been reached (65536)".into(),
    }
  }
}
impl fmt::Display for CompileError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message())
  }
}
impl error::Error for CompileError {}
