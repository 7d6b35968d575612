//! Scoped symbol tables.
//!
//! A run owns exactly one global table (id 0) and at most one local table
//! covering a single function body. Lookup is local-then-global; a local
//! name shadows a global one. Symbol attributes are free-form strings and
//! write-once per key, since several type rules depend on
//! first-writer-wins.

use crate::types::TypeValue;
use std::collections::{BTreeMap, HashMap};

/// Symbol attribute key for the declared type.
pub const KEY_TYPE: &str = "type";
/// Symbol attribute key for the storage offset.
pub const KEY_OFFSET: &str = "offset";
/// Symbol attribute key for a function's code label.
pub const KEY_LABEL: &str = "label";
/// Symbol attribute key for a function's return type.
pub const KEY_RETURN_TYPE: &str = "return_type";
/// Symbol attribute key for a function's parameter count.
pub const KEY_NUM_PARAMS: &str = "num_params";

/// Symbol attribute key for the type of parameter `position` (1-based).
pub fn param_type_key(position: usize) -> String {
    format!("param_type_{position:02}")
}

/// A named symbol with its attribute map.
///
/// Attributes are kept in a sorted map so serialization is deterministic.
#[derive(Debug, Clone)]
pub struct Symbol {
    /// The symbol's lexeme
    pub lexeme: String,
    /// Write-once attribute map
    pub attributes: BTreeMap<String, String>,
}

/// A reference to a symbol in the scope context: which table plus the
/// index within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRef {
    /// True when the symbol lives in the local table
    pub local: bool,
    /// Index within its table
    pub index: usize,
}

/// An indexed, append-only table of symbols.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    id: u32,
    symbols: Vec<Symbol>,
    name_map: HashMap<String, usize>,
}

impl SymbolTable {
    /// Create an empty table with the given id.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            symbols: Vec::new(),
            name_map: HashMap::new(),
        }
    }

    /// The table id (0 for the global table).
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Append a symbol and return its index.
    ///
    /// The name must be non-empty and not already present; both are the
    /// caller's responsibility.
    pub fn add_symbol(&mut self, name: &str) -> usize {
        assert!(!name.is_empty(), "symbol name must not be empty");
        assert!(
            !self.name_map.contains_key(name),
            "symbol {name:?} already present"
        );

        let index = self.symbols.len();
        self.symbols.push(Symbol {
            lexeme: name.to_string(),
            attributes: BTreeMap::new(),
        });
        self.name_map.insert(name.to_string(), index);

        index
    }

    /// Look a name up in this table.
    pub fn search(&self, name: &str) -> Option<usize> {
        self.name_map.get(name).copied()
    }

    /// The lexeme of the symbol at `index`.
    pub fn symbol_name(&self, index: usize) -> &str {
        &self.symbols[index].lexeme
    }

    /// Record an attribute. Attributes are write-once: recording a key
    /// twice for one symbol is a caller bug.
    pub fn add_attribute(&mut self, index: usize, key: &str, value: String) {
        assert!(!key.is_empty(), "attribute key must not be empty");
        let symbol = &mut self.symbols[index];
        assert!(
            !symbol.attributes.contains_key(key),
            "attribute {key:?} already recorded for {:?}",
            symbol.lexeme
        );
        symbol.attributes.insert(key.to_string(), value);
    }

    /// Whether the symbol at `index` has the attribute.
    pub fn has_attribute(&self, index: usize, key: &str) -> bool {
        self.symbols[index].attributes.contains_key(key)
    }

    /// The attribute value, if recorded.
    pub fn attribute(&self, index: usize, key: &str) -> Option<&str> {
        self.symbols[index].attributes.get(key).map(String::as_str)
    }

    /// Serialize the table: a header line with the id, then one line per
    /// symbol and one line per attribute, in insertion resp. key order.
    pub fn write_into(&self, out: &mut String) {
        out.push('#');
        out.push_str(&self.id.to_string());
        out.push_str(":\n");
        for symbol in &self.symbols {
            out.push_str("*'");
            out.push_str(&symbol.lexeme);
            out.push_str("'\n");
            for (key, value) in &symbol.attributes {
                out.push('+');
                out.push_str(key);
                out.push(':');
                out.push_str(value);
                out.push('\n');
            }
        }
    }

    /// Serialize the table to a string.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }
}

/// The scope state of one run: the global table, the optional local
/// table, the offset counters and the implicit-declaration flag.
#[derive(Debug)]
pub struct ScopeContext {
    global: SymbolTable,
    local: Option<SymbolTable>,
    table_counter: u32,
    global_offset: u32,
    local_offset: u32,
    /// When on, an unknown identifier read in a semantic run is declared
    /// in the global table with type `int`. Switched off only while the
    /// identifier of a declaration is being read.
    pub implicit_declaration: bool,
}

impl Default for ScopeContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeContext {
    /// Create a fresh scope context holding an empty global table.
    pub fn new() -> Self {
        Self {
            global: SymbolTable::new(0),
            local: None,
            table_counter: 1,
            global_offset: 0,
            local_offset: 0,
            implicit_declaration: false,
        }
    }

    /// The global table.
    pub fn global(&self) -> &SymbolTable {
        &self.global
    }

    /// The local table, while a function body is being parsed.
    pub fn local(&self) -> Option<&SymbolTable> {
        self.local.as_ref()
    }

    /// The table a scope-close dump serializes: local if one exists.
    pub fn write_current_table(&self, out: &mut String) {
        match &self.local {
            Some(local) => local.write_into(out),
            None => self.global.write_into(out),
        }
    }

    /// Open the local scope of a function body: a fresh table with the
    /// next id and a reset local offset.
    pub fn enter_function_scope(&mut self) {
        self.local = Some(SymbolTable::new(self.table_counter));
        self.table_counter += 1;
        self.local_offset = 0;
    }

    /// Close the local scope, returning the table for inspection.
    pub fn close_local(&mut self) -> Option<SymbolTable> {
        self.local.take()
    }

    /// Look a name up, local scope first.
    pub fn search(&self, name: &str) -> Option<SymbolRef> {
        if let Some(local) = &self.local {
            if let Some(index) = local.search(name) {
                return Some(SymbolRef { local: true, index });
            }
        }

        self.global.search(name).map(|index| SymbolRef {
            local: false,
            index,
        })
    }

    /// Declare a name in the current table (local when one exists).
    pub fn declare(&mut self, name: &str) -> SymbolRef {
        match &mut self.local {
            Some(local) => SymbolRef {
                local: true,
                index: local.add_symbol(name),
            },
            None => SymbolRef {
                local: false,
                index: self.global.add_symbol(name),
            },
        }
    }

    /// Declare a name in the global table regardless of the local scope.
    pub fn declare_global(&mut self, name: &str) -> SymbolRef {
        SymbolRef {
            local: false,
            index: self.global.add_symbol(name),
        }
    }

    /// Resolve an identifier read by the lexer, declaring it when
    /// unknown.
    ///
    /// With implicit-declaration mode off (a semantic run is reading the
    /// identifier of a declaration), only the declaration's target table
    /// is consulted, so a local declaration can shadow a global name.
    /// With it on, lookup is local-then-global and an unknown name is
    /// auto-declared in the global table as an `int` variable at the
    /// next global offset.
    pub fn resolve_identifier(&mut self, name: &str, semantic: bool) -> SymbolRef {
        if semantic && !self.implicit_declaration {
            let target = match &self.local {
                Some(local) => local,
                None => &self.global,
            };
            return match target.search(name) {
                Some(index) => SymbolRef {
                    local: self.local.is_some(),
                    index,
                },
                None => self.declare(name),
            };
        }

        if let Some(found) = self.search(name) {
            return found;
        }

        if semantic {
            let sym = self.declare_global(name);
            self.add_type(sym, &TypeValue::Int);
            let offset = self.alloc_global(TypeValue::Int.width());
            self.add_offset(sym, offset);
            sym
        } else {
            self.declare(name)
        }
    }

    /// Reserve `width` units at the current scope's offset counter.
    pub fn alloc_current(&mut self, width: u32) -> u32 {
        if self.local.is_some() {
            self.alloc_local(width)
        } else {
            self.alloc_global(width)
        }
    }

    /// Reserve `width` units at the local offset counter.
    pub fn alloc_local(&mut self, width: u32) -> u32 {
        let offset = self.local_offset;
        self.local_offset += width;
        offset
    }

    /// Reserve `width` units at the global offset counter.
    pub fn alloc_global(&mut self, width: u32) -> u32 {
        let offset = self.global_offset;
        self.global_offset += width;
        offset
    }

    fn table(&self, sym: SymbolRef) -> &SymbolTable {
        if sym.local {
            self.local.as_ref().expect("no local table open")
        } else {
            &self.global
        }
    }

    fn table_mut(&mut self, sym: SymbolRef) -> &mut SymbolTable {
        if sym.local {
            self.local.as_mut().expect("no local table open")
        } else {
            &mut self.global
        }
    }

    /// The lexeme of a referenced symbol.
    pub fn symbol_name(&self, sym: SymbolRef) -> &str {
        self.table(sym).symbol_name(sym.index)
    }

    fn add_string_attribute(&mut self, sym: SymbolRef, key: &str, value: &str) {
        self.table_mut(sym)
            .add_attribute(sym.index, key, format!("'{value}'"));
    }

    fn add_number_attribute(&mut self, sym: SymbolRef, key: &str, value: u32) {
        self.table_mut(sym)
            .add_attribute(sym.index, key, value.to_string());
    }

    fn string_attribute(&self, sym: SymbolRef, key: &str) -> Option<&str> {
        let raw = self.table(sym).attribute(sym.index, key)?;
        Some(raw.trim_matches('\''))
    }

    /// Whether the symbol already carries a type.
    pub fn has_type(&self, sym: SymbolRef) -> bool {
        self.table(sym).has_attribute(sym.index, KEY_TYPE)
    }

    /// Record a scalar type for the symbol.
    pub fn add_type(&mut self, sym: SymbolRef, ty: &TypeValue) {
        self.add_string_attribute(sym, KEY_TYPE, ty.name());
    }

    /// Record the symbol's storage offset.
    pub fn add_offset(&mut self, sym: SymbolRef, offset: u32) {
        self.add_number_attribute(sym, KEY_OFFSET, offset);
    }

    /// Record a function type: return type plus ordered parameter types.
    /// `params` may be the `[void]` placeholder of an empty list.
    pub fn add_function_type(&mut self, sym: SymbolRef, ret: &TypeValue, params: &[TypeValue]) {
        assert!(!params.is_empty());

        self.add_string_attribute(sym, KEY_TYPE, "function");
        self.add_string_attribute(sym, KEY_RETURN_TYPE, ret.name());

        if params == [TypeValue::Void] {
            self.add_number_attribute(sym, KEY_NUM_PARAMS, 0);
        } else {
            self.add_number_attribute(sym, KEY_NUM_PARAMS, params.len() as u32);
            for (i, param) in params.iter().enumerate() {
                self.add_string_attribute(sym, &param_type_key(i + 1), param.name());
            }
        }
    }

    /// Record a function's code label (its own lexeme). Global symbols
    /// only.
    pub fn add_function_tag(&mut self, sym: SymbolRef) {
        assert!(!sym.local, "function tags only apply to global symbols");
        let name = self.global.symbol_name(sym.index).to_string();
        self.add_string_attribute(sym, KEY_LABEL, &name);
    }

    /// Reconstruct the symbol's type from its attributes.
    ///
    /// Every identifier in a semantic run carries a type by the time the
    /// parser reads it (declared or implicitly declared), so a missing
    /// type attribute is a caller bug.
    pub fn get_type(&self, sym: SymbolRef) -> TypeValue {
        let name = self
            .string_attribute(sym, KEY_TYPE)
            .expect("symbol has no type attribute");

        if name != "function" {
            return TypeValue::from_name(name).expect("unknown stored type name");
        }

        let ret = self
            .string_attribute(sym, KEY_RETURN_TYPE)
            .and_then(TypeValue::from_name)
            .expect("function symbol has no return type");
        let count: usize = self
            .table(sym)
            .attribute(sym.index, KEY_NUM_PARAMS)
            .and_then(|raw| raw.parse().ok())
            .expect("function symbol has no parameter count");

        let params = (1..=count)
            .map(|i| {
                self.string_attribute(sym, &param_type_key(i))
                    .and_then(TypeValue::from_name)
                    .expect("function symbol is missing a parameter type")
            })
            .collect();

        TypeValue::Function {
            ret: Box::new(ret),
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_search() {
        let mut table = SymbolTable::new(0);
        let a = table.add_symbol("alpha");
        let b = table.add_symbol("beta");
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(table.search("alpha"), Some(0));
        assert_eq!(table.search("gamma"), None);
        assert_eq!(table.symbol_name(1), "beta");
    }

    #[test]
    #[should_panic(expected = "already present")]
    fn test_duplicate_symbol_panics() {
        let mut table = SymbolTable::new(0);
        table.add_symbol("twice");
        table.add_symbol("twice");
    }

    #[test]
    #[should_panic(expected = "already recorded")]
    fn test_attribute_write_once() {
        let mut table = SymbolTable::new(0);
        let index = table.add_symbol("x");
        table.add_attribute(index, KEY_TYPE, "'int'".to_string());
        table.add_attribute(index, KEY_TYPE, "'boolean'".to_string());
    }

    #[test]
    fn test_local_shadows_global() {
        let mut scopes = ScopeContext::new();
        scopes.declare_global("x");
        scopes.enter_function_scope();
        scopes.declare("x");

        let found = scopes.search("x").unwrap();
        assert!(found.local);

        scopes.close_local();
        let found = scopes.search("x").unwrap();
        assert!(!found.local);
    }

    #[test]
    fn test_function_type_round_trip() {
        let mut scopes = ScopeContext::new();
        let sym = scopes.declare_global("f");
        scopes.add_function_type(sym, &TypeValue::Int, &[TypeValue::Int, TypeValue::Str]);

        let ty = scopes.get_type(sym);
        assert_eq!(ty, TypeValue::Function {
            ret: Box::new(TypeValue::Int),
            params: vec![TypeValue::Int, TypeValue::Str],
        });
        assert_eq!(ty.arg_types(), vec![TypeValue::Int, TypeValue::Str]);
    }

    #[test]
    fn test_paramless_function_type() {
        let mut scopes = ScopeContext::new();
        let sym = scopes.declare_global("f");
        scopes.add_function_type(sym, &TypeValue::Void, &[TypeValue::Void]);

        let ty = scopes.get_type(sym);
        assert_eq!(ty.arg_types(), vec![TypeValue::Void]);
        assert_eq!(ty.return_type(), TypeValue::Void);
    }

    #[test]
    fn test_declaration_context_shadows_global() {
        let mut scopes = ScopeContext::new();
        let global = scopes.declare_global("x");
        scopes.add_type(global, &TypeValue::Int);

        // Reading the identifier of a local declaration must not resolve
        // to the typed global, or shadowing would report a duplicate.
        scopes.enter_function_scope();
        scopes.implicit_declaration = false;
        let local = scopes.resolve_identifier("x", true);
        assert!(local.local);
        assert!(!scopes.has_type(local));
    }

    #[test]
    fn test_implicit_declaration_types_int() {
        let mut scopes = ScopeContext::new();
        scopes.implicit_declaration = true;
        let sym = scopes.resolve_identifier("counter", true);
        assert!(!sym.local);
        assert_eq!(scopes.get_type(sym), TypeValue::Int);

        // A second implicit symbol lands two bytes further.
        let next = scopes.resolve_identifier("other", true);
        assert_eq!(
            scopes.global().attribute(next.index, KEY_OFFSET),
            Some("2")
        );
    }

    #[test]
    fn test_serialization_idempotent() {
        let mut scopes = ScopeContext::new();
        let sym = scopes.declare_global("x");
        scopes.add_type(sym, &TypeValue::Str);
        scopes.add_offset(sym, 0);

        let first = scopes.global().serialize();
        let second = scopes.global().serialize();
        assert_eq!(first, second);
        assert_eq!(first, "#0:\n*'x'\n+offset:0\n+type:'string'\n");
    }
}
