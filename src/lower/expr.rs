//! Expression lowering: `Expr` -> `(sink value, static type)`.

use super::{ir_type_of, Lowerer};
use crate::ast::{BinOp, Expr};
use crate::diagnostics::Stage;
use crate::ir::{ArithOp, CmpPred, IrSink, IrType};
use crate::runtime::{ALLOCATING_STRING_METHODS, SCALAR_STRING_METHODS};
use crate::types::Type;

pub fn lower_expr<S: IrSink>(lw: &mut Lowerer<S>, expr: &Expr) -> (S::Value, Type) {
    match expr {
        Expr::IntLit(n) => {
            let ty = Type::DEFAULT_INT;
            (lw.sink.const_int(ir_type_of(&ty), *n as i64), ty)
        }
        Expr::FloatLit(f) => {
            let ty = Type::DEFAULT_FLOAT;
            (lw.sink.const_float(ir_type_of(&ty), *f), ty)
        }
        Expr::BoolLit(b) => (lw.sink.const_int(IrType::I32, i64::from(*b)), Type::Bool),
        Expr::CharLit(c) => (lw.sink.const_int(IrType::I8, i64::from(*c as u32)), Type::Char),
        Expr::StrLit(s) => (lw.sink.global_string(s), Type::Str),

        Expr::Ident(name) => match lw.slot_ptr(name) {
            Some((ptr, ty)) => {
                let v = lw.sink.load(ir_type_of(&ty), &ptr);
                (v, ty)
            }
            None => {
                lw.diags.error(Stage::Resolution, None, format!("use of undeclared variable '{name}'"));
                (lw.sink.const_int(IrType::I32, 0), Type::Int(4))
            }
        },

        Expr::ArrayLit(items) => {
            // A bare array literal used as a value (rather than as a decl
            // initializer) has no owning slot of its own; lower it as the
            // pointer to a freshly malloc'd buffer the same way a dynamic
            // list decl's initializer does, but untracked by auto-free
            // since nothing here holds on to it afterward.
            let elem_values: Vec<S::Value> = items.iter().map(|e| lower_expr(lw, e).0).collect();
            let count = lw.sink.const_int(IrType::I64, elem_values.len() as i64);
            let buf = lw.sink.build_call("malloc", &[count], IrType::Ptr);
            for (i, v) in elem_values.iter().enumerate() {
                let idx = lw.sink.const_int(IrType::I64, i as i64);
                let slot = lw.sink.gep(IrType::I64, &buf, &idx);
                lw.sink.store(IrType::I64, v, &slot);
            }
            (buf, Type::DynamicList(Box::new(Type::DEFAULT_INT)))
        }

        Expr::IndexRead { base, index } => lower_index_read(lw, base, index),

        Expr::Slice { base, start, end, step } => {
            let (base_v, _base_ty) = lower_expr(lw, base);
            let zero = lw.sink.const_int(IrType::I32, 0);
            let neg1 = lw.sink.const_int(IrType::I32, -1);
            let start_v = start.as_ref().map(|e| lower_expr(lw, e).0).unwrap_or_else(|| zero.clone());
            let end_v = end.as_ref().map(|e| lower_expr(lw, e).0).unwrap_or_else(|| neg1.clone());
            let one = lw.sink.const_int(IrType::I32, 1);
            let step_v = step.as_ref().map(|e| lower_expr(lw, e).0).unwrap_or(one);
            // Not tracked here: only a named variable's own stack slot is
            // swept at return (see `Lowerer::declare_var`). A slice result
            // is tracked the moment it's stored into one via `VarDecl`.
            let result = lw.sink.build_call("slice", &[base_v, start_v, end_v, step_v], IrType::Ptr);
            (result, Type::Str)
        }

        Expr::Binary { op, lhs, rhs, line } => lower_binary(lw, *op, lhs, rhs, *line),

        Expr::UpdateInPlace { name, increment, prefix, line } => {
            let Some((ptr, ty)) = lw.slot_ptr(name) else {
                lw.diags.error(Stage::Resolution, Some(*line), format!("use of undeclared variable '{name}'"));
                return (lw.sink.const_int(IrType::I32, 0), Type::Int(4));
            };
            let ir_ty = ir_type_of(&ty);
            let old = lw.sink.load(ir_ty, &ptr);
            let one = lw.sink.const_int(ir_ty, 1);
            let op = if *increment { ArithOp::Add } else { ArithOp::Sub };
            let new = lw.sink.build_binop(op, ir_ty, &old, &one);
            lw.sink.store(ir_ty, &new, &ptr);
            (if *prefix { new } else { old }, ty)
        }

        Expr::Call { callee, args, line } => super::call::lower_call(lw, callee, args, *line),

        Expr::MethodCall { receiver, method, args, line } => lower_method_call(lw, receiver, method, args, *line),

        Expr::TypeOf { name, line } => match lw.slot_ptr(name) {
            Some((_, ty)) => (lw.sink.global_string(&ty.to_string()), Type::Str),
            None => {
                lw.diags.error(Stage::Resolution, Some(*line), format!("use of undeclared variable '{name}'"));
                (lw.sink.global_string(""), Type::Str)
            }
        },

        Expr::ByteSize { name, line } => match lw.slot_ptr(name) {
            Some((_, ty)) => {
                let bytes = (ty.storage_bits() / 8) as i64;
                (lw.sink.const_int(ir_type_of(&Type::DEFAULT_INT), bytes), Type::DEFAULT_INT)
            }
            None => {
                lw.diags.error(Stage::Resolution, Some(*line), format!("use of undeclared variable '{name}'"));
                (lw.sink.const_int(IrType::I32, 0), Type::Int(4))
            }
        },
    }
}

fn lower_index_read<S: IrSink>(lw: &mut Lowerer<S>, base: &Expr, index: &Expr) -> (S::Value, Type) {
    let (base_v, base_ty) = lower_expr(lw, base);
    let (index_v, _) = lower_expr(lw, index);
    match base_ty {
        Type::Str | Type::FixedString(_) => {
            let elem_ptr = lw.sink.gep(IrType::I8, &base_v, &index_v);
            (lw.sink.load(IrType::I8, &elem_ptr), Type::Char)
        }
        Type::FixedArray(elem, _) | Type::DynamicList(elem) => {
            let elem_ir = ir_type_of(&elem);
            let elem_ptr = lw.sink.gep(elem_ir, &base_v, &index_v);
            (lw.sink.load(elem_ir, &elem_ptr), *elem)
        }
        other => {
            lw.diags.error(Stage::Type, None, format!("cannot index into type {other}"));
            (lw.sink.const_int(IrType::I32, 0), Type::Int(4))
        }
    }
}

/// Common-type promotion, string `+` concatenation and comparisons
/// (`spec.md` §4.4).
fn lower_binary<S: IrSink>(lw: &mut Lowerer<S>, op: BinOp, lhs: &Expr, rhs: &Expr, line: usize) -> (S::Value, Type) {
    let (lv, lty) = lower_expr(lw, lhs);
    let (rv, rty) = lower_expr(lw, rhs);

    if op == BinOp::Add && (lty == Type::Str || rty == Type::Str) {
        return lower_string_concat(lw, lv, rv);
    }
    if matches!(op, BinOp::Eq | BinOp::Ne) && lty == Type::Str && rty == Type::Str {
        let cmp = lw.sink.build_call("strcmp", &[lv, rv], IrType::I32);
        let zero = lw.sink.const_int(IrType::I32, 0);
        let pred = if op == BinOp::Eq { CmpPred::Eq } else { CmpPred::Ne };
        return (lw.sink.build_icmp(pred, IrType::I32, &cmp, &zero), Type::Bool);
    }

    let Some(common) = Type::promote(&lty, &rty) else {
        lw.diags.error(Stage::Type, Some(line), format!("cannot apply '{}' to {lty} and {rty}", op.symbol()));
        return (lv, lty);
    };
    let lv = lw.coerce_value(lv, &lty, &common, line);
    let rv = lw.coerce_value(rv, &rty, &common, line);
    let ir_ty = ir_type_of(&common);

    match op {
        BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
            let arith = arith_op_for(op, common.is_float());
            (lw.sink.build_binop(arith, ir_ty, &lv, &rv), common)
        }
        BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => {
            let pred = cmp_pred_for(op);
            let cmp = if common.is_float() {
                lw.sink.build_fcmp(pred, ir_ty, &lv, &rv)
            } else {
                lw.sink.build_icmp(pred, ir_ty, &lv, &rv)
            };
            (cmp, Type::Bool)
        }
    }
}

fn ir_type_byte_size(ty: IrType) -> i64 {
    match ty {
        IrType::I1 | IrType::I8 => 1,
        IrType::I16 => 2,
        IrType::I32 | IrType::F32 => 4,
        IrType::I40 => 5,
        IrType::I48 => 6,
        IrType::I56 => 7,
        IrType::I64 | IrType::F64 | IrType::Ptr => 8,
        IrType::Void => 0,
    }
}

fn arith_op_for(op: BinOp, is_float: bool) -> ArithOp {
    match (op, is_float) {
        (BinOp::Add, false) => ArithOp::Add,
        (BinOp::Add, true) => ArithOp::FAdd,
        (BinOp::Sub, false) => ArithOp::Sub,
        (BinOp::Sub, true) => ArithOp::FSub,
        (BinOp::Mul, false) => ArithOp::Mul,
        (BinOp::Mul, true) => ArithOp::FMul,
        (BinOp::Div, false) => ArithOp::SDiv,
        (BinOp::Div, true) => ArithOp::FDiv,
        (BinOp::Mod, false) => ArithOp::SRem,
        (BinOp::Mod, true) => ArithOp::FRem,
        _ => unreachable!("comparison operators handled separately"),
    }
}

fn cmp_pred_for(op: BinOp) -> CmpPred {
    match op {
        BinOp::Eq => CmpPred::Eq,
        BinOp::Ne => CmpPred::Ne,
        BinOp::Lt => CmpPred::Lt,
        BinOp::Gt => CmpPred::Gt,
        BinOp::Le => CmpPred::Le,
        BinOp::Ge => CmpPred::Ge,
        _ => unreachable!("arithmetic operators handled separately"),
    }
}

/// `a + b` where either side is a string: allocate `strlen(a)+strlen(b)+1`
/// bytes, `strcpy`/`strcat` the pieces in, and track the result for the
/// owning function's auto-free sweep (`spec.md` §4.3/§4.4).
fn lower_string_concat<S: IrSink>(lw: &mut Lowerer<S>, lv: S::Value, rv: S::Value) -> (S::Value, Type) {
    let llen = lw.sink.build_call("strlen", &[lv.clone()], IrType::I64);
    let rlen = lw.sink.build_call("strlen", &[rv.clone()], IrType::I64);
    let sum = lw.sink.build_binop(ArithOp::Add, IrType::I64, &llen, &rlen);
    let one = lw.sink.const_int(IrType::I64, 1);
    let total = lw.sink.build_binop(ArithOp::Add, IrType::I64, &sum, &one);
    let buf = lw.sink.build_call("malloc", &[total], IrType::Ptr);
    lw.sink.build_call("strcpy", &[buf.clone(), lv], IrType::Ptr);
    lw.sink.build_call("strcat", &[buf.clone(), rv], IrType::Ptr);
    // Not tracked here: only a named variable's own stack slot is swept
    // at return. This value is tracked once it's stored into one.
    (buf, Type::Str)
}

/// Dispatch a `.method(...)` call to its runtime shim, per the
/// allocating/scalar split in `runtime.rs`. Dynamic-list methods
/// (`push`/`pop`/`len`) are handled inline since they manipulate the
/// caller's own pointer/length/capacity slots rather than calling out.
fn lower_method_call<S: IrSink>(
    lw: &mut Lowerer<S>,
    receiver: &Expr,
    method: &str,
    args: &[Expr],
    line: usize,
) -> (S::Value, Type) {
    let (recv_v, recv_ty) = lower_expr(lw, receiver);

    if let Type::DynamicList(elem_ty) = &recv_ty {
        return lower_list_method(lw, receiver, &recv_v, elem_ty, method, args, line);
    }

    if method == "len" {
        let v = lw.sink.build_call("strlen", &[recv_v], IrType::I64);
        return (v, Type::DEFAULT_INT);
    }

    let arg_values: Vec<S::Value> = args.iter().map(|a| lower_expr(lw, a).0).collect();
    let mut call_args = vec![recv_v];
    call_args.extend(arg_values);

    if ALLOCATING_STRING_METHODS.contains(&method) {
        let result = lw.sink.build_call(method, &call_args, IrType::Ptr);
        return (result, Type::Str);
    }
    if SCALAR_STRING_METHODS.contains(&method) {
        let result = lw.sink.build_call(method, &call_args, IrType::I32);
        return (result, Type::Bool);
    }

    lw.diags.error(Stage::Resolution, Some(line), format!("unknown method '{method}'"));
    (lw.sink.const_int(IrType::I32, 0), Type::Int(4))
}

/// `list.push(x)` / `list.pop()` / `list.len()`. Doubling growth from an
/// initial capacity of 8, per `spec.md` §4.3.
fn lower_list_method<S: IrSink>(
    lw: &mut Lowerer<S>,
    receiver: &Expr,
    recv_v: &S::Value,
    elem_ty: &Type,
    method: &str,
    args: &[Expr],
    line: usize,
) -> (S::Value, Type) {
    let Expr::Ident(base_name) = receiver else {
        lw.diags.error(Stage::Resolution, Some(line), "list method receiver must be a named variable");
        return (lw.sink.const_int(IrType::I32, 0), Type::Int(4));
    };
    let base_slot_hint = lw
        .symbols
        .get(base_name)
        .map(|s| s.slot.clone())
        .unwrap_or_else(|| base_name.clone());
    let len_slot = lw.list_len_slot(&base_slot_hint);
    let cap_slot = lw.list_cap_slot(&base_slot_hint);

    match method {
        "len" => (lw.sink.load(IrType::I32, &len_slot), Type::DEFAULT_INT),
        "push" => {
            let Some(value_expr) = args.first() else {
                lw.diags.error(Stage::Resolution, Some(line), "push() requires one argument");
                return (lw.sink.const_int(IrType::I32, 0), Type::Void);
            };
            let (value, value_ty) = lower_expr(lw, value_expr);
            let value = lw.coerce_value(value, &value_ty, elem_ty, line);

            let len = lw.sink.load(IrType::I32, &len_slot);
            let cap = lw.sink.load(IrType::I32, &cap_slot);
            let needs_growth = lw.sink.build_icmp(CmpPred::Ge, IrType::I32, &len, &cap);
            let two = lw.sink.const_int(IrType::I32, 2);
            let doubled = lw.sink.build_binop(ArithOp::Mul, IrType::I32, &cap, &two);
            let new_cap = lw.sink.build_select(&needs_growth, &doubled, &cap, IrType::I32);
            lw.sink.store(IrType::I32, &new_cap, &cap_slot);

            let elem_size = lw.sink.const_int(IrType::I64, ir_type_byte_size(ir_type_of(elem_ty)));
            let new_cap_64 = lw.sink.build_cast(crate::ir::CastOp::SignExtend, &new_cap, IrType::I32, IrType::I64);
            let new_bytes = lw.sink.build_binop(ArithOp::Mul, IrType::I64, &new_cap_64, &elem_size);
            let grown = lw.sink.build_call("realloc", &[recv_v.clone(), new_bytes], IrType::Ptr);

            // realloc may move the backing storage; write the new pointer
            // back into the variable's own slot before anything else reads
            // it (spec.md §4.3: "reallocating and re-tracking the new
            // pointer"), otherwise later uses of the list reload the stale,
            // possibly-freed pre-realloc pointer.
            if let Some((base_ptr, _)) = lw.slot_ptr(base_name) {
                lw.sink.store(IrType::Ptr, &grown, &base_ptr);
            }

            let len_64 = lw.sink.build_cast(crate::ir::CastOp::SignExtend, &len, IrType::I32, IrType::I64);
            let slot_ptr = lw.sink.gep(ir_type_of(elem_ty), &grown, &len_64);
            lw.sink.store(ir_type_of(elem_ty), &value, &slot_ptr);

            let one = lw.sink.const_int(IrType::I32, 1);
            let new_len = lw.sink.build_binop(ArithOp::Add, IrType::I32, &len, &one);
            lw.sink.store(IrType::I32, &new_len, &len_slot);

            (grown, Type::Void)
        }
        "pop" => {
            let len = lw.sink.load(IrType::I32, &len_slot);
            let one = lw.sink.const_int(IrType::I32, 1);
            let new_len = lw.sink.build_binop(ArithOp::Sub, IrType::I32, &len, &one);
            lw.sink.store(IrType::I32, &new_len, &len_slot);
            let new_len_64 = lw.sink.build_cast(crate::ir::CastOp::SignExtend, &new_len, IrType::I32, IrType::I64);
            let elem_ptr = lw.sink.gep(ir_type_of(elem_ty), recv_v, &new_len_64);
            (lw.sink.load(ir_type_of(elem_ty), &elem_ptr), elem_ty.clone())
        }
        other => {
            lw.diags.error(Stage::Resolution, Some(line), format!("unknown list method '{other}'"));
            (lw.sink.const_int(IrType::I32, 0), Type::Int(4))
        }
    }
}
