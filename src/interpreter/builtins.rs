//! The built-in functions available to every program.
//!
//! The table is position-indexed: the compiler registers each entry in its
//! symbol table at the same index the VM uses for `GetBuiltin`, so the two
//! sides always agree. Misuse produces an [Error](Value::Error) value which
//! flows on the stack like any other value.

use super::value::Value;
use std::rc::Rc;

/// A host-provided function, callable from programs
#[derive(Debug)]
pub struct Builtin {
  pub name: &'static str,
  pub function: fn(&[Value]) -> Option<Value>,
}

/// All built-in functions, in index order
pub static BUILTINS: &[Builtin] = &[
  Builtin {
    name: "len",
    function: |args| {
      let [arg] = args else {
        return Some(wrong_arguments(1, args.len()));
      };
      match arg {
        #[allow(clippy::cast_possible_wrap)]
        Value::String(string) => Some(Value::Integer(string.len() as i64)),
        #[allow(clippy::cast_possible_wrap)]
        Value::Array(elements) => Some(Value::Integer(elements.len() as i64)),
        value => Some(wrong_type("len", value)),
      }
    },
  },
  Builtin {
    name: "head",
    function: |args| {
      let [Value::Array(elements)] = args else {
        return Some(arity_or_type("head", args, 1));
      };
      elements.first().cloned()
    },
  },
  Builtin {
    name: "tail",
    function: |args| {
      let [Value::Array(elements)] = args else {
        return Some(arity_or_type("tail", args, 1));
      };
      if elements.is_empty() {
        None
      } else {
        Some(elements[1..].to_vec().into())
      }
    },
  },
  Builtin {
    name: "last",
    function: |args| {
      let [Value::Array(elements)] = args else {
        return Some(arity_or_type("last", args, 1));
      };
      elements.last().cloned()
    },
  },
  Builtin {
    name: "append",
    function: |args| {
      let [first, item] = args else {
        return Some(wrong_arguments(2, args.len()));
      };
      let Value::Array(elements) = first else {
        return Some(wrong_type("append", first));
      };

      let mut new_elements = Vec::with_capacity(elements.len() + 1);
      new_elements.extend(elements.iter().cloned());
      new_elements.push(item.clone());
      Some(new_elements.into())
    },
  },
  Builtin {
    name: "concat",
    function: |args| {
      let [first, second] = args else {
        return Some(wrong_arguments(2, args.len()));
      };
      let (Value::Array(left), Value::Array(right)) = (first, second) else {
        let offender = if matches!(first, Value::Array(_)) { second } else { first };
        return Some(wrong_type("concat", offender));
      };

      let mut new_elements = Vec::with_capacity(left.len() + right.len());
      new_elements.extend(left.iter().cloned());
      new_elements.extend(right.iter().cloned());
      Some(new_elements.into())
    },
  },
];

fn error(message: String) -> Value {
  Value::Error(Rc::from(message))
}

fn wrong_arguments(expected: usize, got: usize) -> Value {
  error(format!(
    "wrong number of arguments, expected {expected} got {got}"
  ))
}

fn wrong_type(builtin: &str, value: &Value) -> Value {
  error(format!(
    "argument to `{builtin}` not supported, got {}",
    value.get_type()
  ))
}

fn arity_or_type(builtin: &str, args: &[Value], expected: usize) -> Value {
  if args.len() == expected {
    wrong_type(builtin, &args[0])
  } else {
    wrong_arguments(expected, args.len())
  }
}
