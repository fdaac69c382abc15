//! Statement and control-flow lowering (`spec.md` §4.5).

use super::expr::lower_expr;
use super::{ir_type_of, Lowerer};
use crate::ast::{Expr, Stmt};
use crate::diagnostics::Stage;
use crate::ir::{ArithOp, CastOp, CmpPred, IrSink, IrType};
use crate::types::Type;

/// Lower a statement list, stopping early if a `return` or other
/// terminator already closed the current block — emitting anything past
/// it would be unreachable, ill-formed IR.
pub fn lower_block<S: IrSink>(lw: &mut Lowerer<S>, stmts: &[Stmt]) {
    for stmt in stmts {
        if lw.sink.current_block_terminated() {
            break;
        }
        lower_stmt(lw, stmt);
    }
}

fn lower_stmt<S: IrSink>(lw: &mut Lowerer<S>, stmt: &Stmt) {
    match stmt {
        Stmt::Expr(e) => {
            lower_expr(lw, e);
        }

        Stmt::Assign { name, rhs, line } => {
            let (value, from_ty) = lower_expr(lw, rhs);
            match lw.slot_ptr(name) {
                Some((ptr, ty)) => {
                    let coerced = lw.coerce_value(value, &from_ty, &ty, *line);
                    lw.sink.store(ir_type_of(&ty), &coerced, &ptr);
                }
                None => {
                    lw.diags.error(Stage::Resolution, Some(*line), format!("assignment to undeclared variable '{name}'"));
                }
            }
        }

        Stmt::VarDecl { name, type_name, init, line, .. } => {
            let ty = Type::from_type_name(type_name).unwrap_or_else(|e| {
                lw.diags.error(Stage::Type, Some(*line), e);
                Type::DEFAULT_INT
            });
            let ptr = lw.declare_var(name, ty.clone());
            match init {
                Some(e) => {
                    let (value, from_ty) = lower_expr(lw, e);
                    let value = lw.coerce_value(value, &from_ty, &ty, *line);
                    lw.sink.store(ir_type_of(&ty), &value, &ptr);
                }
                None if !matches!(ty, Type::Str | Type::DynamicList(_)) => {
                    let zero = zero_value(lw, &ty);
                    lw.sink.store(ir_type_of(&ty), &zero, &ptr);
                }
                None => {} // Str/DynamicList slots already start null.
            }
        }

        Stmt::FixedStringDecl { name, capacity, init, line } => {
            let ty = Type::FixedString(*capacity);
            let ptr = lw.declare_var(name, ty);
            let size = lw.sink.const_int(IrType::I64, i64::from(*capacity));
            let buf = lw.sink.build_call("malloc", &[size], IrType::Ptr);
            lw.sink.store(IrType::Ptr, &buf, &ptr);
            let (init_v, init_ty) = lower_expr(lw, init);
            if init_ty != Type::Str {
                lw.diags.error(Stage::Type, Some(*line), "fixed-string initializer must be a string");
            }
            lw.sink.build_call("strcpy", &[buf.clone(), init_v], IrType::Ptr);
            let last = lw.sink.const_int(IrType::I64, i64::from(*capacity) - 1);
            let term_ptr = lw.sink.gep(IrType::I8, &buf, &last);
            let nul = lw.sink.const_int(IrType::I8, 0);
            lw.sink.store(IrType::I8, &nul, &term_ptr);
        }

        Stmt::FixedArrayDecl { name, elem_type_name, size, init, line } => {
            let elem_ty = Type::from_type_name(elem_type_name).unwrap_or_else(|e| {
                lw.diags.error(Stage::Type, Some(*line), e);
                Type::DEFAULT_INT
            });
            let ty = Type::FixedArray(Box::new(elem_ty.clone()), *size);
            let ptr = lw.declare_var(name, ty);
            let elem_ir = ir_type_of(&elem_ty);
            let bytes = lw.sink.const_int(IrType::I64, i64::from(*size) * elem_byte_size(elem_ir));
            let buf = lw.sink.build_call("malloc", &[bytes], IrType::Ptr);
            lw.sink.store(IrType::Ptr, &buf, &ptr);
            if let Some(items) = init {
                for (i, item) in items.iter().enumerate() {
                    let (value, from_ty) = lower_expr(lw, item);
                    let value = lw.coerce_value(value, &from_ty, &elem_ty, *line);
                    let idx = lw.sink.const_int(IrType::I64, i as i64);
                    let slot = lw.sink.gep(elem_ir, &buf, &idx);
                    lw.sink.store(elem_ir, &value, &slot);
                }
            }
        }

        Stmt::DynamicListDecl { name, elem_type_name, init, line } => {
            let elem_ty = Type::from_type_name(elem_type_name).unwrap_or_else(|e| {
                lw.diags.error(Stage::Type, Some(*line), e);
                Type::DEFAULT_INT
            });
            let ty = Type::DynamicList(Box::new(elem_ty.clone()));
            let ptr = lw.declare_var(name, ty); // already null-initialized and tracked
            let slot_hint = lw.symbols.get(name).map(|s| s.slot.clone()).unwrap_or_else(|| name.clone());
            let len_slot = lw.list_len_slot(&slot_hint);
            let cap_slot = lw.list_cap_slot(&slot_hint);

            let initial_len = init.as_ref().map(Vec::len).unwrap_or(0);
            let capacity = initial_len.max(8);
            let elem_ir = ir_type_of(&elem_ty);
            let bytes = lw.sink.const_int(IrType::I64, capacity as i64 * elem_byte_size(elem_ir));
            let buf = lw.sink.build_call("malloc", &[bytes], IrType::Ptr);
            lw.sink.store(IrType::Ptr, &buf, &ptr);

            let cap_v = lw.sink.const_int(IrType::I32, capacity as i64);
            lw.sink.store(IrType::I32, &cap_v, &cap_slot);
            let len_v = lw.sink.const_int(IrType::I32, initial_len as i64);
            lw.sink.store(IrType::I32, &len_v, &len_slot);

            if let Some(items) = init {
                for (i, item) in items.iter().enumerate() {
                    let (value, from_ty) = lower_expr(lw, item);
                    let value = lw.coerce_value(value, &from_ty, &elem_ty, *line);
                    let idx = lw.sink.const_int(IrType::I64, i as i64);
                    let slot = lw.sink.gep(elem_ir, &buf, &idx);
                    lw.sink.store(elem_ir, &value, &slot);
                }
            }
        }

        Stmt::IndexWrite { base, index, rhs, line } => {
            let (base_v, base_ty) = lower_expr(lw, base);
            let (index_v, _) = lower_expr(lw, index);
            let elem_ty = match &base_ty {
                Type::FixedArray(elem, _) | Type::DynamicList(elem) => (**elem).clone(),
                Type::Str | Type::FixedString(_) => Type::Char,
                other => {
                    lw.diags.error(Stage::Type, Some(*line), format!("cannot index-assign into type {other}"));
                    Type::Int(4)
                }
            };
            let (value, from_ty) = lower_expr(lw, rhs);
            let value = lw.coerce_value(value, &from_ty, &elem_ty, *line);
            let elem_ir = ir_type_of(&elem_ty);
            let slot = lw.sink.gep(elem_ir, &base_v, &index_v);
            lw.sink.store(elem_ir, &value, &slot);
        }

        Stmt::Block(stmts) => lower_block(lw, stmts),

        Stmt::If { cond, then_block, else_block, .. } => {
            let (cond_v, _) = lower_expr(lw, cond);
            let then_b = lw.new_block("if_then");
            let else_b = lw.new_block("if_else");
            let merge_b = lw.new_block("if_merge");

            lw.sink.build_cond_br(&cond_v, &then_b, &else_b);

            lw.sink.set_insert_point(&then_b);
            lower_block(lw, then_block);
            if !lw.sink.current_block_terminated() {
                lw.sink.build_br(&merge_b);
            }

            lw.sink.set_insert_point(&else_b);
            if let Some(else_stmts) = else_block {
                lower_block(lw, else_stmts);
            }
            if !lw.sink.current_block_terminated() {
                lw.sink.build_br(&merge_b);
            }

            lw.sink.set_insert_point(&merge_b);
        }

        Stmt::Loop { cond, body, .. } => {
            let cond_b = lw.new_block("loop_cond");
            let body_b = lw.new_block("loop_body");
            let after_b = lw.new_block("loop_after");

            lw.sink.build_br(&cond_b);
            lw.sink.set_insert_point(&cond_b);
            let (cond_v, _) = lower_expr(lw, cond);
            lw.sink.build_cond_br(&cond_v, &body_b, &after_b);

            lw.sink.set_insert_point(&body_b);
            lower_block(lw, body);
            if !lw.sink.current_block_terminated() {
                lw.sink.build_br(&cond_b);
            }

            lw.sink.set_insert_point(&after_b);
        }

        Stmt::LoopIndexOverString { var, expr, body, line } => lower_counted_loop(lw, var, expr, body, *line),

        Stmt::Return { value, line } => match value {
            Some(e) => {
                let (v, from_ty) = lower_expr(lw, e);
                let ret_ty = lw.current_ret_ty.clone();
                let v = lw.coerce_value(v, &from_ty, &ret_ty, *line);
                lw.emit_free_sweep(Some(&v));
                let ir_ret_ty = ir_type_of(&ret_ty);
                lw.sink.build_ret(Some(&v), ir_ret_ty);
            }
            None => {
                lw.emit_free_sweep(None);
                lw.sink.build_ret(None, IrType::Void);
            }
        },

        Stmt::Print { args, .. } => lower_print(lw, args),
    }
}

/// `loop id in expr { body }`: `id` is an integer index ranging over
/// `[0, len(expr))`; the body is responsible for indexing `expr` itself
/// (`spec.md` §4.5).
fn lower_counted_loop<S: IrSink>(lw: &mut Lowerer<S>, var: &str, expr: &Expr, body: &[Stmt], line: usize) {
    let (base_v, base_ty) = lower_expr(lw, expr);
    let len_v = match &base_ty {
        Type::Str | Type::FixedString(_) => {
            let len64 = lw.sink.build_call("strlen", &[base_v], IrType::I64);
            lw.sink.build_cast(CastOp::Truncate, &len64, IrType::I64, IrType::I32)
        }
        Type::FixedArray(_, n) => lw.sink.const_int(IrType::I32, i64::from(*n)),
        Type::DynamicList(_) => {
            if let Expr::Ident(name) = expr {
                let slot_hint = lw.symbols.get(name).map(|s| s.slot.clone()).unwrap_or_else(|| name.clone());
                let len_slot = lw.list_len_slot(&slot_hint);
                lw.sink.load(IrType::I32, &len_slot)
            } else {
                lw.diags.error(Stage::Resolution, Some(line), "loop over a list requires a named variable");
                lw.sink.const_int(IrType::I32, 0)
            }
        }
        other => {
            lw.diags.error(Stage::Type, Some(line), format!("cannot iterate over type {other}"));
            lw.sink.const_int(IrType::I32, 0)
        }
    };

    let idx_ptr = lw.declare_var(var, Type::DEFAULT_INT);
    let zero = lw.sink.const_int(IrType::I32, 0);
    lw.sink.store(IrType::I32, &zero, &idx_ptr);

    let cond_b = lw.new_block("range_cond");
    let body_b = lw.new_block("range_body");
    let after_b = lw.new_block("range_after");

    lw.sink.build_br(&cond_b);
    lw.sink.set_insert_point(&cond_b);
    let idx_v = lw.sink.load(IrType::I32, &idx_ptr);
    let keep_going = lw.sink.build_icmp(CmpPred::Lt, IrType::I32, &idx_v, &len_v);
    lw.sink.build_cond_br(&keep_going, &body_b, &after_b);

    lw.sink.set_insert_point(&body_b);
    lower_block(lw, body);
    if !lw.sink.current_block_terminated() {
        let idx_v = lw.sink.load(IrType::I32, &idx_ptr);
        let one = lw.sink.const_int(IrType::I32, 1);
        let next = lw.sink.build_binop(ArithOp::Add, IrType::I32, &idx_v, &one);
        lw.sink.store(IrType::I32, &next, &idx_ptr);
        lw.sink.build_br(&cond_b);
    }

    lw.sink.set_insert_point(&after_b);
}

/// `print(a, b, ...)`: builds one `printf` format string from each
/// argument's static type and calls it variadically (`spec.md` §4.5).
fn lower_print<S: IrSink>(lw: &mut Lowerer<S>, args: &[Expr]) {
    let mut fmt = String::new();
    let mut values = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            fmt.push(' ');
        }
        let (value, ty) = lower_expr(lw, arg);
        fmt.push_str(placeholder_for(&ty));
        values.push(value);
    }
    fmt.push('\n');
    let fmt_v = lw.sink.global_string(&fmt);
    let mut call_args = vec![fmt_v];
    call_args.extend(values);
    lw.sink.build_call("printf", &call_args, IrType::I32);
}

fn placeholder_for(ty: &Type) -> &'static str {
    match ty {
        Type::Float(_) => "%f",
        Type::Bool => "%d",
        Type::Char => "%c",
        Type::Str | Type::FixedString(_) => "%s",
        _ => "%lld",
    }
}

fn zero_value<S: IrSink>(lw: &mut Lowerer<S>, ty: &Type) -> S::Value {
    if ty.is_float() {
        lw.sink.const_float(ir_type_of(ty), 0.0)
    } else if ty.is_pointer_like() {
        lw.sink.const_null_ptr()
    } else {
        lw.sink.const_int(ir_type_of(ty), 0)
    }
}

fn elem_byte_size(ty: IrType) -> i64 {
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
