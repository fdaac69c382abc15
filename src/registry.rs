//! Function registry and per-function symbol table (`spec.md` §3, §4.3).
//!
//! Grounded on the resolver's merge-by-name bookkeeping in
//! `examples/navicore-cem3/crates/compiler/src/resolver.rs`, generalized
//! from "which words are visible" to "what is each function's parameter
//! schema, and what locals does the function currently in lowering own".

use std::collections::HashMap;

use crate::ast::{Expr, Func};
use crate::types::Type;

/// One parameter's schema: declared type name (for diagnostics) and an
/// optional default-value AST, cloned fresh at each call site per
/// `spec.md` §4.6.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSchema {
    pub name: String,
    pub type_name: String,
    pub default: Option<Expr>,
}

/// Global `function-name -> parameter schema` map. Write-once-per-name: a
/// repeated function name overwrites silently, matching `spec.md` §5
/// ("so selective imports can filter by deletion").
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    entries: HashMap<String, Vec<ParamSchema>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, func: &Func) {
        let params = func
            .params
            .iter()
            .map(|p| ParamSchema {
                name: p.name.clone(),
                type_name: p.type_name.clone(),
                default: p.default.clone(),
            })
            .collect();
        self.entries.insert(func.name.clone(), params);
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    pub fn params(&self, name: &str) -> Option<&[ParamSchema]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn slot_index(&self, func_name: &str, param_name: &str) -> Option<usize> {
        self.params(func_name)?
            .iter()
            .position(|p| p.name == param_name)
    }
}

/// What a symbol-table slot tracks for a local variable.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotInfo {
    /// Name of the backing stack-slot IR value (an alloca).
    pub slot: String,
    pub ty: Type,
}

/// Per-function flat symbol table (`spec.md` §3: "no nested-scope
/// discipline is required; all locals in a function share one flat
/// scope"). Shadowing reuses the old slot only when the new storage is at
/// least as wide (see `spec.md` §9 Open Questions — this crate documents
/// and keeps that rule rather than silently changing it; see DESIGN.md).
#[derive(Debug, Default)]
pub struct SymbolTable {
    locals: HashMap<String, SlotInfo>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&SlotInfo> {
        self.locals.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    /// Declare `name` with a freshly allocated slot, or reuse the existing
    /// slot if the new type's storage is at least as wide as the existing
    /// type's (a same-or-widening redeclaration). A narrowing redeclaration
    /// allocates a fresh slot instead.
    /// Returns `true` if a new slot was allocated (caller must `alloca`).
    pub fn declare(&mut self, name: &str, ty: Type, fresh_slot_name: impl FnOnce() -> String) -> (bool, String) {
        if let Some(existing) = self.locals.get(name) {
            if ty.storage_bits() >= existing.ty.storage_bits() {
                let slot = existing.slot.clone();
                self.locals.insert(
                    name.to_string(),
                    SlotInfo {
                        slot: slot.clone(),
                        ty,
                    },
                );
                return (false, slot);
            }
        }
        let slot = fresh_slot_name();
        self.locals.insert(
            name.to_string(),
            SlotInfo {
                slot: slot.clone(),
                ty,
            },
        );
        (true, slot)
    }

    pub fn clear(&mut self) {
        self.locals.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.locals.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::FuncArg;

    fn func(name: &str, params: Vec<(&str, &str)>) -> Func {
        Func {
            return_type_name: "void".into(),
            name: name.into(),
            params: params
                .into_iter()
                .map(|(ty, n)| FuncArg {
                    type_name: ty.into(),
                    name: n.into(),
                    default: None,
                })
                .collect(),
            body: vec![],
            line: 1,
        }
    }

    #[test]
    fn register_then_lookup_slot_index() {
        let mut reg = FunctionRegistry::new();
        reg.register(&func("add", vec![("int", "a"), ("int", "b")]));
        assert_eq!(reg.slot_index("add", "b"), Some(1));
        assert!(reg.contains("add"));
    }

    #[test]
    fn repeated_registration_overwrites_silently() {
        let mut reg = FunctionRegistry::new();
        reg.register(&func("f", vec![("int", "a")]));
        reg.register(&func("f", vec![("int", "a"), ("int", "b")]));
        assert_eq!(reg.params("f").unwrap().len(), 2);
    }

    #[test]
    fn symbol_table_widening_shadow_reuses_slot() {
        let mut table = SymbolTable::new();
        let mut counter = 0;
        let (allocated, slot1) = table.declare("x", Type::Int(2), || {
            counter += 1;
            format!("slot{counter}")
        });
        assert!(allocated);
        let (allocated2, slot2) = table.declare("x", Type::Int(4), || {
            counter += 1;
            format!("slot{counter}")
        });
        assert!(!allocated2);
        assert_eq!(slot1, slot2);
    }

    #[test]
    fn symbol_table_narrowing_shadow_allocates_fresh_slot() {
        let mut table = SymbolTable::new();
        let mut counter = 0;
        let (_, slot1) = table.declare("x", Type::Int(8), || {
            counter += 1;
            format!("slot{counter}")
        });
        let (allocated2, slot2) = table.declare("x", Type::Int(1), || {
            counter += 1;
            format!("slot{counter}")
        });
        assert!(allocated2);
        assert_ne!(slot1, slot2);
    }

    #[test]
    fn clear_empties_table() {
        let mut table = SymbolTable::new();
        table.declare("x", Type::Int(4), || "s0".to_string());
        assert!(!table.is_empty());
        table.clear();
        assert!(table.is_empty());
    }
}
