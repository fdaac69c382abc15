//! IR emission: lowers a type-checked `Program` into calls against an
//! `IrSink` (`spec.md` §4-§5).
//!
//! Grounded on the teacher's emission shape
//! (`examples/navicore-cem3/crates/compiler/src/codegen/mod.rs`: one
//! `CodeGen` struct owning the in-progress module plus a per-function pass
//! that walks the typed tree), generalized from Seq's stack-effect
//! bytecode to the tree-walking, slot-based lowering an imperative
//! language needs.

mod call;
mod expr;
mod stmt;
mod tracker;

use std::collections::HashMap;

use crate::ast::{Func, Program};
use crate::diagnostics::{Diagnostics, Stage};
use crate::ir::{CastOp, CmpPred, IrSink, IrType, Linkage};
use crate::registry::{FunctionRegistry, SymbolTable};
use crate::runtime::RUNTIME_FUNCTIONS;
use crate::types::{coerce, Coercion, Type};

pub use tracker::AutoFreeTracker;

/// Map a source-level `Type` onto the IR type used to store it. Fixed
/// strings, fixed arrays and dynamic lists are all represented as a
/// pointer to their backing storage; the list's length/capacity live in
/// sibling slots (`Lowerer::list_len_slot`/`list_cap_slot`) rather than in
/// a single aggregate type, since the text sink models scalars only.
pub fn ir_type_of(ty: &Type) -> IrType {
    if ty.is_pointer_like() {
        return IrType::Ptr;
    }
    match ty {
        Type::Bool => IrType::I32,
        Type::Char => IrType::I8,
        Type::Int(_) => IrType::from_bits(ty.storage_bits()),
        Type::Float(n) if *n <= 4 => IrType::F32,
        Type::Float(_) => IrType::F64,
        Type::Void => IrType::Void,
        _ => IrType::Ptr,
    }
}

/// Lowering state for one function body. Holds the sink, the symbol
/// table for the function currently being lowered, and the auto-free
/// tracker for that function.
pub struct Lowerer<'a, S: IrSink> {
    sink: &'a mut S,
    registry: &'a FunctionRegistry,
    return_types: &'a HashMap<String, Type>,
    diags: &'a mut Diagnostics,
    symbols: SymbolTable,
    slot_values: HashMap<String, S::Value>,
    tracker: AutoFreeTracker<S::Value>,
    slot_counter: usize,
    current_ret_ty: Type,
    func: S::Function,
}

impl<'a, S: IrSink> Lowerer<'a, S> {
    fn new_block(&mut self, hint: &str) -> S::Block {
        let f = self.func.clone();
        self.sink.create_block(&f, hint)
    }

    /// Declare (or widen-reuse) a local variable's slot and return its
    /// backing pointer value, allocating a fresh stack slot when needed.
    fn declare_var(&mut self, name: &str, ty: Type) -> S::Value {
        let mut counter = self.slot_counter;
        let (allocated, slot) = self.symbols.declare(name, ty.clone(), || {
            counter += 1;
            format!("{name}.{counter}")
        });
        self.slot_counter = counter;
        if allocated {
            let ptr = self.sink.alloca(ir_type_of(&ty), &slot);
            self.slot_values.insert(slot.clone(), ptr.clone());
            if matches!(ty, Type::Str | Type::DynamicList(_)) {
                let null = self.sink.const_null_ptr();
                self.sink.store(IrType::Ptr, &null, &ptr);
                self.tracker.track(ptr.clone());
            }
            ptr
        } else {
            self.slot_values[&slot].clone()
        }
    }

    /// Bind a parameter's stack slot. Unlike `declare_var`, this never
    /// null-initializes or tracks the slot: the function does not own a
    /// parameter's heap memory, so it must not free it on return.
    fn declare_param(&mut self, name: &str, ty: Type) -> S::Value {
        let mut counter = self.slot_counter;
        let (_, slot) = self.symbols.declare(name, ty.clone(), || {
            counter += 1;
            format!("{name}.{counter}")
        });
        self.slot_counter = counter;
        let ptr = self.sink.alloca(ir_type_of(&ty), &slot);
        self.slot_values.insert(slot, ptr.clone());
        ptr
    }

    fn slot_ptr(&self, name: &str) -> Option<(S::Value, Type)> {
        let info = self.symbols.get(name)?;
        let ty = info.ty.clone();
        let ptr = self.slot_values.get(&info.slot)?.clone();
        Some((ptr, ty))
    }

    /// Companion slot holding a dynamic list's current length, keyed off
    /// the list's own slot name (`spec.md` §4.3 layout: pointer/len/cap
    /// triple, modeled here as three sibling scalar slots rather than one
    /// aggregate, since the text sink has no struct types).
    fn list_len_slot(&mut self, base_slot_hint: &str) -> S::Value {
        let key = format!("{base_slot_hint}.len");
        if let Some(v) = self.slot_values.get(&key) {
            return v.clone();
        }
        let ptr = self.sink.alloca(IrType::I32, &key);
        self.slot_values.insert(key, ptr.clone());
        ptr
    }

    fn list_cap_slot(&mut self, base_slot_hint: &str) -> S::Value {
        let key = format!("{base_slot_hint}.cap");
        if let Some(v) = self.slot_values.get(&key) {
            return v.clone();
        }
        let ptr = self.sink.alloca(IrType::I32, &key);
        self.slot_values.insert(key, ptr.clone());
        ptr
    }

    /// Apply the coercion `spec.md` §7 requires to move a value of type
    /// `from` into a slot/argument of type `to`.
    fn coerce_value(&mut self, value: S::Value, from: &Type, to: &Type, line: usize) -> S::Value {
        match coerce(from, to) {
            Ok(Coercion::None) | Ok(Coercion::Discard) => value,
            Ok(Coercion::SignExtend) => {
                self.sink.build_cast(CastOp::SignExtend, &value, ir_type_of(from), ir_type_of(to))
            }
            Ok(Coercion::Truncate) => {
                self.sink.build_cast(CastOp::Truncate, &value, ir_type_of(from), ir_type_of(to))
            }
            Ok(Coercion::IntToFloat) => {
                self.sink.build_cast(CastOp::SIToFP, &value, ir_type_of(from), ir_type_of(to))
            }
            Ok(Coercion::FloatToInt) => {
                self.sink.build_cast(CastOp::FPToSI, &value, ir_type_of(from), ir_type_of(to))
            }
            Ok(Coercion::FloatWiden) => {
                self.sink.build_cast(CastOp::FPExt, &value, ir_type_of(from), ir_type_of(to))
            }
            Ok(Coercion::FloatNarrow) => {
                self.sink.build_cast(CastOp::FPTrunc, &value, ir_type_of(from), ir_type_of(to))
            }
            Err(msg) => {
                self.diags.error(Stage::Type, Some(line), msg);
                value
            }
        }
    }

    /// Free every tracked slot except the one holding the value about to
    /// be returned, masking it out with `select` against null instead of
    /// branching around the `free` call (`spec.md` §4.3).
    fn emit_free_sweep(&mut self, returning: Option<&S::Value>) {
        let slots: Vec<S::Value> = self.tracker.slots().to_vec();
        for slot in slots {
            let ptr = self.sink.load(IrType::Ptr, &slot);
            let to_free = match returning {
                Some(ret_val) => {
                    let is_ret = self.sink.build_icmp(CmpPred::Eq, IrType::Ptr, &ptr, ret_val);
                    let null = self.sink.const_null_ptr();
                    self.sink.build_select(&is_ret, &null, &ptr, IrType::Ptr)
                }
                None => ptr,
            };
            self.sink.build_call("free", &[to_free], IrType::Void);
        }
    }
}

/// Lower a whole program: declare every runtime shim, then every
/// user-defined function in source order.
pub fn lower_program<S: IrSink>(program: &Program, registry: &FunctionRegistry, sink: &mut S, diags: &mut Diagnostics) {
    sink.create_module("quanta");
    for rt in RUNTIME_FUNCTIONS.iter() {
        sink.declare_external(rt.name, rt.params, rt.ret);
    }

    let return_types: HashMap<String, Type> = program
        .funcs
        .iter()
        .map(|f| (f.name.clone(), Type::from_type_name(&f.return_type_name).unwrap_or(Type::Void)))
        .collect();

    for func in &program.funcs {
        lower_function(func, registry, &return_types, sink, diags);
    }
}

fn lower_function<S: IrSink>(
    func: &Func,
    registry: &FunctionRegistry,
    return_types: &HashMap<String, Type>,
    sink: &mut S,
    diags: &mut Diagnostics,
) {
    let ret_ty = Type::from_type_name(&func.return_type_name).unwrap_or(Type::Void);
    let param_tys: Vec<Type> = func
        .params
        .iter()
        .map(|p| Type::from_type_name(&p.type_name).unwrap_or(Type::DEFAULT_INT))
        .collect();
    let param_list: Vec<(String, IrType)> = func
        .params
        .iter()
        .zip(&param_tys)
        .map(|(p, ty)| (p.name.clone(), ir_type_of(ty)))
        .collect();
    let ir_ret = ir_type_of(&ret_ty);

    let ir_func = sink.create_function(&func.name, &param_list, ir_ret, Linkage::External);
    let entry = sink.create_block(&ir_func, "entry");
    sink.set_insert_point(&entry);

    let mut lw = Lowerer {
        sink,
        registry,
        return_types,
        diags,
        symbols: SymbolTable::new(),
        slot_values: HashMap::new(),
        tracker: AutoFreeTracker::new(),
        slot_counter: 0,
        current_ret_ty: ret_ty.clone(),
        func: ir_func.clone(),
    };

    // Copy each incoming parameter register into its own stack slot so the
    // body can treat parameters exactly like any other local.
    for (param, ty) in func.params.iter().zip(param_tys) {
        let incoming = lw.sink.function_param(&ir_func, &param.name);
        let ptr = lw.declare_param(&param.name, ty.clone());
        lw.sink.store(ir_type_of(&ty), &incoming, &ptr);
    }

    stmt::lower_block(&mut lw, &func.body);

    if !lw.sink.current_block_terminated() {
        match &lw.current_ret_ty {
            Type::Void => {
                lw.emit_free_sweep(None);
                lw.sink.build_ret(None, IrType::Void);
            }
            Type::Float(n) => {
                let ir_ty = ir_type_of(&Type::Float(*n));
                let zero = lw.sink.const_float(ir_ty, 0.0);
                lw.emit_free_sweep(Some(&zero));
                lw.sink.build_ret(Some(&zero), ir_ty);
            }
            other => {
                let ir_ty = ir_type_of(other);
                let zero = lw.sink.const_int(ir_ty, 0);
                lw.emit_free_sweep(Some(&zero));
                lw.sink.build_ret(Some(&zero), ir_ty);
            }
        }
    }
}
