use super::builtins::BUILTINS;
use rustc_hash::FxHashMap;

/// Where a symbol lives, which determines the instruction used to load it
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SymbolScope {
  Global,
  Local,
  Builtin,
  Free,
}

/// A resolved identifier: its name, scope class, and slot index.
/// Indices are allocated per scope class, in definition order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
  pub name: String,
  pub scope: SymbolScope,
  pub index: usize,
}

/// A lexically nested mapping from names to [Symbol]s.
///
/// Each function literal gets its own table enclosing the one outside it.
/// Resolving a name which crosses a function boundary to a local promotes it
/// to a free variable, recording the original symbol so the enclosing
/// compiler can emit the capture.
#[derive(Clone, Debug, Default)]
pub struct SymbolTable {
  store: FxHashMap<String, Symbol>,
  num_definitions: usize,
  free_symbols: Vec<Symbol>,
  outer: Option<Box<SymbolTable>>,
}
impl SymbolTable {
  /// Create a top-level symbol table, with the built-in functions registered
  pub fn global() -> Self {
    let mut table = Self::default();
    for (index, builtin) in BUILTINS.iter().enumerate() {
      table.define_builtin(index, builtin.name);
    }
    table
  }

  /// Create a table for a scope nested inside `outer`
  pub(crate) fn enclosing(outer: SymbolTable) -> Self {
    Self {
      outer: Some(Box::new(outer)),
      ..Self::default()
    }
  }

  /// Discard this scope, returning the table it encloses
  pub(crate) fn into_outer(self) -> Option<SymbolTable> {
    self.outer.map(|outer| *outer)
  }

  /// The number of symbols defined directly in this scope, which is the
  /// number of local slots a function needs reserved
  pub(crate) fn num_definitions(&self) -> usize {
    self.num_definitions
  }

  /// The symbols captured from enclosing scopes, in capture order
  pub(crate) fn free_symbols(&self) -> &[Symbol] {
    &self.free_symbols
  }

  /// Define a new symbol in this scope: global at the top level, local
  /// inside a function
  pub fn define(&mut self, name: &str) -> Symbol {
    let scope = if self.outer.is_none() {
      SymbolScope::Global
    } else {
      SymbolScope::Local
    };

    let symbol = Symbol {
      name: name.to_owned(),
      scope,
      index: self.num_definitions,
    };
    self.num_definitions += 1;
    self.store.insert(name.to_owned(), symbol.clone());

    symbol
  }

  /// Register a built-in function at an externally supplied index
  pub fn define_builtin(&mut self, index: usize, name: &str) -> Symbol {
    let symbol = Symbol {
      name: name.to_owned(),
      scope: SymbolScope::Builtin,
      index,
    };
    self.store.insert(name.to_owned(), symbol.clone());

    symbol
  }

  /// Capture a symbol from an enclosing scope as a free variable of this one
  fn define_free(&mut self, original: Symbol) -> Symbol {
    let symbol = Symbol {
      name: original.name.clone(),
      scope: SymbolScope::Free,
      index: self.free_symbols.len(),
    };
    self.free_symbols.push(original);
    self.store.insert(symbol.name.clone(), symbol.clone());

    symbol
  }

  /// Look up a name, walking outwards through enclosing scopes.
  ///
  /// A hit on a local (or free) of an enclosing function is promoted into
  /// this scope's capture list; globals and built-ins pass through
  /// unchanged.
  pub fn resolve(&mut self, name: &str) -> Option<Symbol> {
    if let Some(symbol) = self.store.get(name) {
      return Some(symbol.clone());
    }

    let symbol = self.outer.as_mut()?.resolve(name)?;
    match symbol.scope {
      SymbolScope::Global | SymbolScope::Builtin => Some(symbol),
      SymbolScope::Local | SymbolScope::Free => Some(self.define_free(symbol)),
    }
  }
}
