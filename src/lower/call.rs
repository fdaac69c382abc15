//! User-defined function call lowering: the 5-step binding algorithm from
//! `spec.md` §4.6 (sentinel-missing array, positional then keyword slot
//! filling, default-value fallback, coercion, emit call).

use super::expr::lower_expr;
use super::{ir_type_of, Lowerer};
use crate::ast::{CallArg, Expr};
use crate::diagnostics::Stage;
use crate::ir::IrSink;
use crate::types::Type;

pub fn lower_call<S: IrSink>(lw: &mut Lowerer<S>, callee: &str, args: &[CallArg], line: usize) -> (S::Value, Type) {
    let Some(schema) = lw.registry.params(callee).map(<[_]>::to_vec) else {
        lw.diags.error(Stage::Resolution, Some(line), format!("call to undefined function '{callee}'"));
        return (lw.sink.const_int(crate::ir::IrType::I32, 0), Type::DEFAULT_INT);
    };

    let mut slots: Vec<Option<Expr>> = vec![None; schema.len()];
    let mut positional_cursor = 0;
    for arg in args {
        match &arg.name {
            None => {
                while positional_cursor < slots.len() && slots[positional_cursor].is_some() {
                    positional_cursor += 1;
                }
                if positional_cursor < slots.len() {
                    slots[positional_cursor] = Some(arg.value.clone());
                    positional_cursor += 1;
                } else {
                    lw.diags.error(Stage::Resolution, Some(line), format!("call to '{callee}': too many positional arguments"));
                }
            }
            Some(kw) => match schema.iter().position(|p| &p.name == kw) {
                Some(idx) => {
                    if slots[idx].is_some() {
                        lw.diags.error(Stage::Resolution, Some(line), format!("call to '{callee}': argument '{kw}' supplied twice"));
                    } else {
                        slots[idx] = Some(arg.value.clone());
                    }
                }
                None => lw.diags.error(Stage::Resolution, Some(line), format!("call to '{callee}': no such parameter '{kw}'")),
            },
        }
    }

    let mut arg_values = Vec::with_capacity(schema.len());
    for (i, param) in schema.iter().enumerate() {
        let Some(expr) = slots[i].clone().or_else(|| param.default.clone()) else {
            lw.diags.error(Stage::Resolution, Some(line), format!("call to '{callee}': missing required argument '{}'", param.name));
            continue;
        };
        let (value, value_ty) = lower_expr(lw, &expr);
        let param_ty = Type::from_type_name(&param.type_name).unwrap_or(Type::DEFAULT_INT);
        arg_values.push(lw.coerce_value(value, &value_ty, &param_ty, line));
    }

    let ret_ty = lw.return_types.get(callee).cloned().unwrap_or(Type::Void);
    let value = lw.sink.build_call(callee, &arg_values, ir_type_of(&ret_ty));
    (value, ret_ty)
}
