use super::{
  builtins::BUILTINS,
  bytecode::OpCode,
  compiler::Bytecode,
  value::{Closure, CompiledFunction, Value},
};
use rustc_hash::FxHashMap;
use std::{error, fmt, rc::Rc};

/// The maximum number of values on the stack
pub const STACK_SIZE: usize = 2048;
/// The maximum number of global bindings in a program
pub const GLOBALS_SIZE: usize = 65536;
/// The maximum depth of the call stack
pub const MAX_FRAMES: usize = 1024;

/// A call frame: an executing closure, its instruction pointer, and where
/// its locals start on the value stack.
///
/// The instruction pointer starts at -1 so the pre-increment at the top of
/// the dispatch loop lands on the first instruction.
#[derive(Debug)]
struct Frame {
  closure: Rc<Closure>,
  ip: isize,
  base_pointer: usize,
}
impl Frame {
  fn new(closure: Rc<Closure>, base_pointer: usize) -> Self {
    Self {
      closure,
      ip: -1,
      base_pointer,
    }
  }
}

/// A virtual machine to execute compiled bytecode.
///
/// Owns a fixed-size value stack, a flat globals array, and a stack of call
/// frames. The top-level program runs as the closure of frame zero.
pub struct VM {
  constants: Vec<Value>,

  stack: Vec<Value>,
  sp: usize,

  globals: Vec<Value>,

  frames: Vec<Frame>,
}
impl VM {
  /// Create a new VM to execute the given bytecode
  #[must_use]
  pub fn new(bytecode: Bytecode) -> Self {
    Self::with_globals(bytecode, vec![Value::Null; GLOBALS_SIZE])
  }

  /// Create a new VM which reuses the global bindings of a previous run,
  /// so a REPL can accumulate state across inputs
  ///
  /// # Panics
  /// Panics if `globals` was not created by [`VM::new`] originally
  #[must_use]
  pub fn with_globals(bytecode: Bytecode, globals: Vec<Value>) -> Self {
    assert_eq!(globals.len(), GLOBALS_SIZE);

    let main_function = CompiledFunction {
      instructions: bytecode.instructions,
      num_locals: 0,
      num_params: 0,
    };
    let main_closure = Closure {
      function: Rc::new(main_function),
      captured: Vec::new(),
    };

    let mut frames = Vec::with_capacity(MAX_FRAMES);
    frames.push(Frame::new(Rc::new(main_closure), 0));

    Self {
      constants: bytecode.constants,
      stack: vec![Value::Null; STACK_SIZE],
      sp: 0,
      globals,
      frames,
    }
  }

  /// Take back the global bindings, to thread into the next run
  #[must_use]
  pub fn into_globals(self) -> Vec<Value> {
    self.globals
  }

  /// The most recently popped value: what an expression statement left
  /// behind. This is what the REPL prints.
  #[must_use]
  pub fn last_popped(&self) -> &Value {
    &self.stack[self.sp]
  }

  fn current_frame(&self) -> &Frame {
    self.frames.last().expect("frame zero is never popped")
  }
  fn current_frame_mut(&mut self) -> &mut Frame {
    self.frames.last_mut().expect("frame zero is never popped")
  }

  #[inline]
  fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
    if self.sp >= STACK_SIZE {
      return Err(RuntimeError::StackOverflow);
    }

    self.stack[self.sp] = value;
    self.sp += 1;
    Ok(())
  }

  /// Remove the top value of the stack. The slot is left intact, which is
  /// what makes [`VM::last_popped`] work.
  ///
  /// A degenerate conditional branch (one ending in a `let`, or empty)
  /// produces no value for the pop which follows it, so an empty stack here
  /// is reportable, not a bug.
  #[inline]
  fn pop(&mut self) -> Result<Value, RuntimeError> {
    if self.sp == 0 {
      return Err(RuntimeError::StackUnderflow);
    }

    self.sp -= 1;
    Ok(self.stack[self.sp].clone())
  }

  /// Read the u16 operand of the current instruction, advancing past it
  #[inline]
  fn read_u16_operand(&mut self) -> usize {
    let frame = self.current_frame_mut();
    #[allow(clippy::cast_sign_loss)]
    let operand = frame
      .closure
      .function
      .instructions
      .read_u16(frame.ip as usize + 1);
    frame.ip += 2;
    operand as usize
  }

  /// Read the u8 operand of the current instruction, advancing past it
  #[inline]
  fn read_u8_operand(&mut self) -> usize {
    let frame = self.current_frame_mut();
    #[allow(clippy::cast_sign_loss)]
    let operand = frame.closure.function.instructions.byte(frame.ip as usize + 1);
    frame.ip += 1;
    operand as usize
  }

  /// Run the fetch-decode-execute cycle until the top-level instructions
  /// are exhausted
  ///
  /// # Errors
  /// Returns an error if a runtime error is encountered in the bytecode
  /// being executed
  #[allow(
    clippy::too_many_lines,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
  )]
  pub fn run(&mut self) -> Result<(), RuntimeError> {
    loop {
      let frame = self.current_frame_mut();
      let instruction_count = frame.closure.function.instructions.len();
      if frame.ip >= instruction_count as isize - 1 {
        break;
      }

      frame.ip += 1;
      let op = OpCode::from(frame.closure.function.instructions.byte(frame.ip as usize));

      match op {
        OpCode::Constant => {
          let index = self.read_u16_operand();
          self.push(self.constants[index].clone())?;
        }
        OpCode::True => self.push(Value::Boolean(true))?,
        OpCode::False => self.push(Value::Boolean(false))?,
        OpCode::Null => self.push(Value::Null)?,

        OpCode::Add
        | OpCode::Subtract
        | OpCode::Multiply
        | OpCode::Divide
        | OpCode::Remainder => self.binary_operation(op)?,

        OpCode::Equal | OpCode::NotEqual | OpCode::Greater | OpCode::GreaterEqual => {
          self.comparison_operation(op)?;
        }

        OpCode::Not => {
          let value = self.pop()?;
          self.push(Value::Boolean(!value.is_truthy()))?;
        }
        OpCode::Negate => {
          let value = self.pop()?;
          match value {
            Value::Integer(value) => self.push(Value::Integer(value.wrapping_neg()))?,
            value => {
              return Err(RuntimeError::TypeError {
                expected: "integer",
                got: value.get_type(),
              })
            }
          }
        }

        OpCode::Jump => {
          let target = self.read_u16_operand();
          self.current_frame_mut().ip = target as isize - 1;
        }
        OpCode::JumpIfFalse => {
          let target = self.read_u16_operand();
          let condition = self.pop()?;
          if !condition.is_truthy() {
            self.current_frame_mut().ip = target as isize - 1;
          }
        }

        OpCode::SetGlobal => {
          let index = self.read_u16_operand();
          self.globals[index] = self.pop()?;
        }
        OpCode::GetGlobal => {
          let index = self.read_u16_operand();
          self.push(self.globals[index].clone())?;
        }
        OpCode::SetLocal => {
          let index = self.read_u8_operand();
          let base_pointer = self.current_frame().base_pointer;
          self.stack[base_pointer + index] = self.pop()?;
        }
        OpCode::GetLocal => {
          let index = self.read_u8_operand();
          let base_pointer = self.current_frame().base_pointer;
          self.push(self.stack[base_pointer + index].clone())?;
        }
        OpCode::GetBuiltin => {
          let index = self.read_u8_operand();
          self.push(Value::Builtin(&BUILTINS[index]))?;
        }
        OpCode::GetFree => {
          let index = self.read_u8_operand();
          let value = self.current_frame().closure.captured[index].clone();
          self.push(value)?;
        }

        OpCode::Array => {
          let length = self.read_u16_operand();
          let elements = self.stack[self.sp - length..self.sp].to_vec();
          self.sp -= length;
          self.push(elements.into())?;
        }
        OpCode::Hash => {
          let length = self.read_u16_operand();
          let hash = self.build_hash(self.sp - length, self.sp)?;
          self.sp -= length;
          self.push(hash)?;
        }
        OpCode::Index => {
          let index = self.pop()?;
          let left = self.pop()?;
          self.index_operation(&left, &index)?;
        }

        OpCode::Closure => {
          let constant = self.read_u16_operand();
          let capture_count = self.read_u8_operand();

          let Value::Function(function) = &self.constants[constant] else {
            return Err(RuntimeError::NonFunctionClosure);
          };
          let closure = Closure {
            function: Rc::clone(function),
            captured: self.stack[self.sp - capture_count..self.sp].to_vec(),
          };
          self.sp -= capture_count;
          self.push(Value::Closure(Rc::new(closure)))?;
        }

        OpCode::Call => {
          let argument_count = self.read_u8_operand();
          self.call(argument_count)?;
        }
        OpCode::ReturnValue => {
          let value = self.pop()?;
          let frame = self.pop_frame()?;
          self.sp = frame.base_pointer - 1;
          self.push(value)?;
        }
        OpCode::Return => {
          let frame = self.pop_frame()?;
          self.sp = frame.base_pointer - 1;
          self.push(Value::Null)?;
        }

        OpCode::Pop => {
          self.pop()?;
        }
      }
    }

    Ok(())
  }

  /// Leave a function call. The top-level program is not a call, so a
  /// `return` reaching frame zero is an error rather than a frame pop.
  fn pop_frame(&mut self) -> Result<Frame, RuntimeError> {
    if self.frames.len() == 1 {
      return Err(RuntimeError::ReturnOutsideFunction);
    }
    Ok(self.frames.pop().expect("more than one frame exists"))
  }

  fn call(&mut self, argument_count: usize) -> Result<(), RuntimeError> {
    let callee = self.stack[self.sp - 1 - argument_count].clone();

    match callee {
      Value::Closure(closure) => {
        let function = &closure.function;
        if argument_count != function.num_params {
          return Err(RuntimeError::WrongNumberOfArguments {
            expected: function.num_params,
            got: argument_count,
          });
        }
        if self.frames.len() >= MAX_FRAMES {
          return Err(RuntimeError::CallStackOverflow);
        }

        let base_pointer = self.sp - argument_count;
        if base_pointer + function.num_locals > STACK_SIZE {
          return Err(RuntimeError::StackOverflow);
        }

        // the arguments already sit in the first local slots; reserve the
        // rest above them
        self.sp = base_pointer + function.num_locals;
        self.frames.push(Frame::new(closure, base_pointer));
        Ok(())
      }
      Value::Builtin(builtin) => {
        let arguments = &self.stack[self.sp - argument_count..self.sp];
        let result = (builtin.function)(arguments);

        self.sp -= argument_count + 1;
        self.push(result.unwrap_or(Value::Null))
      }
      value => Err(RuntimeError::NotCallable(value.get_type())),
    }
  }

  fn binary_operation(&mut self, op: OpCode) -> Result<(), RuntimeError> {
    let right = self.pop()?;
    let left = self.pop()?;

    match (&left, &right) {
      (Value::Integer(left), Value::Integer(right)) => {
        if *right == 0 && matches!(op, OpCode::Divide | OpCode::Remainder) {
          return Err(RuntimeError::DivisionByZero);
        }

        let result = match op {
          OpCode::Add => left.wrapping_add(*right),
          OpCode::Subtract => left.wrapping_sub(*right),
          OpCode::Multiply => left.wrapping_mul(*right),
          OpCode::Divide => left.wrapping_div(*right),
          OpCode::Remainder => left.wrapping_rem(*right),
          _ => unreachable!("only binary operators are dispatched here"),
        };
        self.push(Value::Integer(result))
      }
      (Value::String(left), Value::String(right)) if op == OpCode::Add => {
        let mut concatenated = String::with_capacity(left.len() + right.len());
        concatenated.push_str(left);
        concatenated.push_str(right);
        self.push(concatenated.into())
      }
      _ => Err(RuntimeError::UnsupportedOperands {
        operation: operator_symbol(op),
        left: left.get_type(),
        right: right.get_type(),
      }),
    }
  }

  fn comparison_operation(&mut self, op: OpCode) -> Result<(), RuntimeError> {
    let right = self.pop()?;
    let left = self.pop()?;

    if let (Value::Integer(left), Value::Integer(right)) = (&left, &right) {
      let result = match op {
        OpCode::Equal => left == right,
        OpCode::NotEqual => left != right,
        OpCode::Greater => left > right,
        OpCode::GreaterEqual => left >= right,
        _ => unreachable!("only comparison operators are dispatched here"),
      };
      return self.push(Value::Boolean(result));
    }

    match op {
      OpCode::Equal => self.push(Value::Boolean(left.runtime_eq(&right))),
      OpCode::NotEqual => self.push(Value::Boolean(!left.runtime_eq(&right))),
      _ => Err(RuntimeError::UnsupportedOperands {
        operation: operator_symbol(op),
        left: left.get_type(),
        right: right.get_type(),
      }),
    }
  }

  fn index_operation(&mut self, left: &Value, index: &Value) -> Result<(), RuntimeError> {
    match (left, index) {
      (Value::Array(elements), Value::Integer(index)) => {
        #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
        let element = if *index < 0 || *index as usize >= elements.len() {
          Value::Null
        } else {
          elements[*index as usize].clone()
        };
        self.push(element)
      }
      (Value::Hash(pairs), index) => {
        let Some(key) = index.hash_key() else {
          return Err(RuntimeError::NotHashable(index.get_type()));
        };
        let value = match pairs.get(&key) {
          Some((_, value)) => value.clone(),
          None => Value::Null,
        };
        self.push(value)
      }
      _ => Err(RuntimeError::NotIndexable {
        container: left.get_type(),
        index: index.get_type(),
      }),
    }
  }

  fn build_hash(&self, start: usize, end: usize) -> Result<Value, RuntimeError> {
    let mut pairs = FxHashMap::default();

    for i in (start..end).step_by(2) {
      let key = self.stack[i].clone();
      let value = self.stack[i + 1].clone();

      let Some(hash_key) = key.hash_key() else {
        return Err(RuntimeError::NotHashable(key.get_type()));
      };
      pairs.insert(hash_key, (key, value));
    }

    Ok(Value::Hash(Rc::new(pairs)))
  }
}

fn operator_symbol(op: OpCode) -> &'static str {
  match op {
    OpCode::Add => "+",
    OpCode::Subtract => "-",
    OpCode::Multiply => "*",
    OpCode::Divide => "/",
    OpCode::Remainder => "%",
    OpCode::Equal => "==",
    OpCode::NotEqual => "!=",
    OpCode::Greater => ">",
    OpCode::GreaterEqual => ">=",
    _ => unreachable!("only operators have symbols"),
  }
}

/// An error whilst executing bytecode. These abort execution; the misuse of
/// a built-in function instead produces an error [Value] which programs can
/// observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
  /// More than [STACK_SIZE] values on the stack
  StackOverflow,
  /// A pop from an empty stack, from a conditional branch which produced
  /// no value
  StackUnderflow,
  /// More than [MAX_FRAMES] call frames
  CallStackOverflow,
  /// A closure called with the wrong number of arguments
  WrongNumberOfArguments { expected: usize, got: usize },
  /// Calling a value which is not a closure or built-in function
  NotCallable(&'static str),
  /// A unary operation on an unsupported type
  TypeError {
    expected: &'static str,
    got: &'static str,
  },
  /// A binary operation on unsupported types
  UnsupportedOperands {
    operation: &'static str,
    left: &'static str,
    right: &'static str,
  },
  /// Indexing a value which is not an array or hashmap
  NotIndexable {
    container: &'static str,
    index: &'static str,
  },
  /// Using an unhashable type as a hashmap key
  NotHashable(&'static str),
  /// Integer division or remainder by zero
  DivisionByZero,
  /// A closure instruction pointing at a constant which is not a function
  NonFunctionClosure,
  /// A `return` statement at the top level of a program
  ReturnOutsideFunction,
}
impl RuntimeError {
  /// The title of the error message
  #[must_use]
  pub fn title(&self) -> &'static str {
    match self {
      Self::StackOverflow => "Stack Overflow",
      Self::StackUnderflow => "Stack Underflow",
      Self::CallStackOverflow => "Call Stack Overflow",
      Self::WrongNumberOfArguments { .. } => "Wrong Number of Arguments",
      Self::NotCallable(_) => "Not Callable",
      Self::TypeError { .. } | Self::UnsupportedOperands { .. } => "Type Error",
      Self::NotIndexable { .. } => "Not Indexable",
      Self::NotHashable(_) => "Not Hashable",
      Self::DivisionByZero => "Division By Zero",
      Self::NonFunctionClosure => "Non-Function Closure",
      Self::ReturnOutsideFunction => "Return Outside Function",
    }
  }

  /// The body of the error message describing what has gone wrong
  #[must_use]
  pub fn message(&self) -> String {
    match self {
      Self::StackOverflow => format!("more than {STACK_SIZE} values on the stack"),
      Self::StackUnderflow => "a conditional branch left no value behind".into(),
      Self::CallStackOverflow => format!("more than {MAX_FRAMES} nested calls"),
      Self::WrongNumberOfArguments { expected, got } => {
        format!("wrong number of arguments: want {expected}, got {got}")
      }
      Self::NotCallable(type_) => {
        format!("`{type_}` is not callable, only functions are callable")
      }
      Self::TypeError { expected, got } => format!("expected `{expected}`, got `{got}`"),
      Self::UnsupportedOperands {
        operation,
        left,
        right,
      } => format!("`{operation}` is not supported for `{left}` and `{right}`"),
      Self::NotIndexable { container, index } => {
        format!("`{container}` cannot be indexed by `{index}`")
      }
      Self::NotHashable(type_) => {
        format!("`{type_}` cannot be used as a hashmap key")
      }
      Self::DivisionByZero => "integer division by zero".into(),
      Self::NonFunctionClosure => "can only close over functions".into(),
      Self::ReturnOutsideFunction => "`return` is only allowed inside a function".into(),
    }
  }
}
impl fmt::Display for RuntimeError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.message())
  }
}
impl error::Error for RuntimeError {}
