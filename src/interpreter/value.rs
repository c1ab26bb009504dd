use super::{builtins::Builtin, bytecode::Instructions};
use rustc_hash::FxHashMap;
use std::{fmt, rc::Rc};

/// A runtime value in the interpreter.
///
/// Integers, booleans, and null are stored inline; everything else lives
/// behind an [Rc] so values stay cheap to clone as they move through the
/// stack, globals, and capture vectors.
#[derive(Clone, Debug)]
pub enum Value {
  Integer(i64),
  Boolean(bool),
  String(Rc<str>),
  Null,
  Array(Rc<Vec<Value>>),
  Hash(Rc<FxHashMap<HashKey, (Value, Value)>>),
  Function(Rc<CompiledFunction>),
  Closure(Rc<Closure>),
  Builtin(&'static Builtin),
  Error(Rc<str>),
}
impl Value {
  /// Is the value truthy? Only `false` and `null` are not.
  #[inline]
  pub fn is_truthy(&self) -> bool {
    !matches!(self, Value::Boolean(false) | Value::Null)
  }

  /// Get the name of the type of the value
  pub fn get_type(&self) -> &'static str {
    match self {
      Value::Integer(_) => "integer",
      Value::Boolean(_) => "boolean",
      Value::String(_) => "string",
      Value::Null => "null",
      Value::Array(_) => "array",
      Value::Hash(_) => "hashmap",
      Value::Function(_) => "function",
      Value::Closure(_) => "closure",
      Value::Builtin(_) => "built-in function",
      Value::Error(_) => "error",
    }
  }

  /// The key this value hashes to, if it is a hashable type
  /// (integer, boolean, or string)
  pub fn hash_key(&self) -> Option<HashKey> {
    match self {
      #[allow(clippy::cast_sign_loss)]
      Value::Integer(value) => Some(HashKey::Integer(*value as u64)),
      Value::Boolean(value) => Some(HashKey::Boolean(u64::from(*value))),
      Value::String(value) => Some(HashKey::String(fnv1a(value.as_bytes()))),
      _ => None,
    }
  }

  /// Equality as observed by running programs.
  ///
  /// Integers compare by value; booleans and null are canonical values; any
  /// other pair compares by identity of the shared allocation.
  pub fn runtime_eq(&self, other: &Value) -> bool {
    match (self, other) {
      (Value::Integer(left), Value::Integer(right)) => left == right,
      (Value::Boolean(left), Value::Boolean(right)) => left == right,
      (Value::Null, Value::Null) => true,
      (Value::String(left), Value::String(right)) => Rc::ptr_eq(left, right),
      (Value::Array(left), Value::Array(right)) => Rc::ptr_eq(left, right),
      (Value::Hash(left), Value::Hash(right)) => Rc::ptr_eq(left, right),
      (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
      (Value::Closure(left), Value::Closure(right)) => Rc::ptr_eq(left, right),
      (Value::Error(left), Value::Error(right)) => Rc::ptr_eq(left, right),
      (Value::Builtin(left), Value::Builtin(right)) => std::ptr::eq(*left, *right),
      _ => false,
    }
  }
}

/// Structural equality, for tests and constant pools. Runtime `==` uses
/// [`Value::runtime_eq`] instead.
impl PartialEq for Value {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Value::Integer(left), Value::Integer(right)) => left == right,
      (Value::Boolean(left), Value::Boolean(right)) => left == right,
      (Value::Null, Value::Null) => true,
      (Value::String(left), Value::String(right)) => left == right,
      (Value::Array(left), Value::Array(right)) => left == right,
      (Value::Hash(left), Value::Hash(right)) => left == right,
      (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
      (Value::Closure(left), Value::Closure(right)) => Rc::ptr_eq(left, right),
      (Value::Builtin(left), Value::Builtin(right)) => std::ptr::eq(*left, *right),
      (Value::Error(left), Value::Error(right)) => left == right,
      _ => false,
    }
  }
}

impl fmt::Display for Value {
  /// The printable form of the value, as shown by the REPL
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Value::Integer(value) => write!(f, "{value}"),
      Value::Boolean(value) => write!(f, "{value}"),
      Value::String(value) => write!(f, "{value}"),
      Value::Null => write!(f, "null"),
      Value::Array(elements) => {
        let elements: Vec<String> = elements.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", elements.join(", "))
      }
      Value::Hash(pairs) => {
        let pairs: Vec<String> = pairs
          .values()
          .map(|(key, value)| format!("{key}: {value}"))
          .collect();
        write!(f, "{{{}}}", pairs.join(", "))
      }
      Value::Function(_) => write!(f, "<function>"),
      Value::Closure(_) => write!(f, "<closure>"),
      Value::Builtin(builtin) => write!(f, "<built-in {}>", builtin.name),
      Value::Error(message) => write!(f, "ERROR :{message}"),
    }
  }
}

impl From<i64> for Value {
  fn from(value: i64) -> Self {
    Value::Integer(value)
  }
}
impl From<bool> for Value {
  fn from(value: bool) -> Self {
    Value::Boolean(value)
  }
}
impl From<&str> for Value {
  fn from(value: &str) -> Self {
    Value::String(value.into())
  }
}
impl From<String> for Value {
  fn from(value: String) -> Self {
    Value::String(value.into())
  }
}
impl From<Vec<Value>> for Value {
  fn from(elements: Vec<Value>) -> Self {
    Value::Array(Rc::new(elements))
  }
}

/// The key a hashable [Value] is stored under in a hashmap.
///
/// Two values share a key exactly when they are equal values of the same
/// hashable type: integers map to their bits, booleans to 1/0, and strings
/// to the 64-bit FNV-1a hash of their bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum HashKey {
  Integer(u64),
  Boolean(u64),
  String(u64),
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
  bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
    (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
  })
}

/// A block of compiled instructions, plus the stack space it needs.
///
/// Created by the compiler as a constant; the VM never executes one
/// directly, only through a [Closure].
#[derive(Debug, PartialEq, Eq)]
pub struct CompiledFunction {
  pub instructions: Instructions,
  pub num_locals: usize,
  pub num_params: usize,
}

/// A [CompiledFunction] bundled with the values it captured from enclosing
/// scopes. The capture vector is immutable once built.
#[derive(Debug)]
pub struct Closure {
  pub function: Rc<CompiledFunction>,
  pub captured: Vec<Value>,
}

#[cfg(test)]
mod test {
  use super::{HashKey, Value};
  use std::rc::Rc;

  #[test]
  fn truthiness() {
    assert!(Value::Integer(0).is_truthy());
    assert!(Value::Integer(7).is_truthy());
    assert!(Value::from("").is_truthy());
    assert!(Value::Boolean(true).is_truthy());

    assert!(!Value::Boolean(false).is_truthy());
    assert!(!Value::Null.is_truthy());
  }

  #[test]
  fn hash_keys() {
    let hello = Value::from("Hello World");
    let also_hello = Value::from("Hello World");
    let other = Value::from("My name is johnny");

    assert_eq!(hello.hash_key(), also_hello.hash_key());
    assert_ne!(hello.hash_key(), other.hash_key());

    assert_eq!(Value::Integer(1).hash_key(), Some(HashKey::Integer(1)));
    assert_eq!(Value::Boolean(true).hash_key(), Some(HashKey::Boolean(1)));
    assert_eq!(Value::Boolean(false).hash_key(), Some(HashKey::Boolean(0)));

    // equal numbers and booleans never collide across types
    assert_ne!(Value::Integer(1).hash_key(), Value::Boolean(true).hash_key());

    assert_eq!(Value::Null.hash_key(), None);
    assert_eq!(Value::from(Vec::new()).hash_key(), None);
  }

  #[test]
  fn runtime_equality_is_identity_for_strings() {
    let shared: Rc<str> = "hello".into();
    let left = Value::String(Rc::clone(&shared));
    let right = Value::String(shared);
    assert!(left.runtime_eq(&right));

    // same contents, different allocations
    assert!(!Value::from("hello").runtime_eq(&Value::from("hello")));

    assert!(Value::Integer(3).runtime_eq(&Value::Integer(3)));
    assert!(Value::Null.runtime_eq(&Value::Null));
    assert!(!Value::Boolean(false).runtime_eq(&Value::Null));
  }

  #[test]
  fn printable_forms() {
    assert_eq!(Value::Integer(-3).to_string(), "-3");
    assert_eq!(Value::Boolean(true).to_string(), "true");
    assert_eq!(Value::Null.to_string(), "null");
    assert_eq!(Value::from("tamarin").to_string(), "tamarin");
    assert_eq!(
      Value::from(vec![Value::Integer(1), Value::from("two")]).to_string(),
      "[1, two]"
    );
    assert_eq!(Value::Error("boom".into()).to_string(), "ERROR :boom");
  }
}
