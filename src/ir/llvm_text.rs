//! A concrete `IrSink`: emits portable LLVM IR as text, the same strategy
//! the teacher uses wholesale
//! (`examples/navicore-cem3/crates/compiler/src/codegen.rs` header:
//! "Generates LLVM IR as text (.ll files)... simpler and more portable
//! than using FFI bindings (inkwell)"). Turning the emitted `.ll` text
//! into a real object file (instruction selection, register allocation,
//! linking) is the concrete backend's job and out of scope here
//! (`spec.md` §1) — `serialize_to_object_file` writes the assembled IR
//! text to the given path, which is exactly as far as this core's
//! contract with the backend goes (`spec.md` §6: "serialize the module to
//! an object file at a given path").

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;

use super::{ArithOp, CastOp, CmpPred, IrSink, IrType, Linkage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value(pub String);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block(pub String);
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function(pub String);

pub struct LlvmTextSink {
    module_name: String,
    declarations: String,
    string_globals: String,
    functions: Vec<String>,
    current_function: String,
    temp_counter: usize,
    block_counter: usize,
    string_counter: usize,
    string_constants: HashMap<String, String>,
    terminated: bool,
    target_triple: &'static str,
    data_layout: &'static str,
}

impl LlvmTextSink {
    pub fn new() -> Self {
        LlvmTextSink {
            module_name: String::new(),
            declarations: String::new(),
            string_globals: String::new(),
            functions: Vec::new(),
            current_function: String::new(),
            temp_counter: 0,
            block_counter: 0,
            string_counter: 0,
            string_constants: HashMap::new(),
            terminated: false,
            target_triple: target_triple(),
            data_layout: "e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-i128:128-f80:128-n8:16:32:64-S128",
        }
    }

    fn fresh_temp(&mut self) -> String {
        let t = format!("%t{}", self.temp_counter);
        self.temp_counter += 1;
        t
    }

    fn fresh_block(&mut self, hint: &str) -> String {
        let label = format!("{hint}{}", self.block_counter);
        self.block_counter += 1;
        label
    }

    /// Assembled text of the whole module: declarations, string globals,
    /// then every function definition in emission order, including
    /// whichever function is still being built (closed with `}` as a
    /// copy, leaving the live buffer open for further instructions).
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "; ModuleID = '{}'", self.module_name);
        let _ = writeln!(out, "target datalayout = \"{}\"", self.data_layout);
        let _ = writeln!(out, "target triple = \"{}\"", self.target_triple);
        out.push('\n');
        out.push_str(&self.string_globals);
        out.push('\n');
        out.push_str(&self.declarations);
        out.push('\n');
        for func in &self.functions {
            out.push_str(func);
            out.push_str("}\n\n");
        }
        if !self.current_function.is_empty() {
            out.push_str(&self.current_function);
            out.push_str("}\n");
        }
        out
    }

    fn escape_llvm_string(s: &str) -> String {
        let mut result = String::new();
        for byte in s.as_bytes() {
            match *byte {
                b'\\' => result.push_str(r"\\"),
                b'"' => result.push_str(r#"\22"#),
                0x20..=0x7e => result.push(*byte as char),
                _ => {
                    let _ = write!(result, r"\{:02X}", byte);
                }
            }
        }
        result
    }
}

impl Default for LlvmTextSink {
    fn default() -> Self {
        Self::new()
    }
}

fn target_triple() -> &'static str {
    #[cfg(all(target_os = "macos", target_arch = "aarch64"))]
    {
        "arm64-apple-macosx14.0.0"
    }
    #[cfg(all(target_os = "macos", target_arch = "x86_64"))]
    {
        "x86_64-apple-darwin"
    }
    #[cfg(all(target_os = "linux", target_arch = "x86_64"))]
    {
        "x86_64-unknown-linux-gnu"
    }
    #[cfg(all(target_os = "linux", target_arch = "aarch64"))]
    {
        "aarch64-unknown-linux-gnu"
    }
    #[cfg(not(any(
        all(target_os = "macos", target_arch = "aarch64"),
        all(target_os = "macos", target_arch = "x86_64"),
        all(target_os = "linux", target_arch = "x86_64"),
        all(target_os = "linux", target_arch = "aarch64")
    )))]
    {
        "unknown"
    }
}

impl IrSink for LlvmTextSink {
    type Value = Value;
    type Block = Block;
    type Function = Function;

    fn create_module(&mut self, name: &str) {
        self.module_name = name.to_string();
    }

    fn declare_external(&mut self, name: &str, params: &[IrType], ret: IrType) {
        let param_list = params
            .iter()
            .map(|t| t.llvm_name())
            .collect::<Vec<_>>()
            .join(", ");
        let variadic = if name == "printf" { ", ..." } else { "" };
        let _ = writeln!(
            self.declarations,
            "declare {} @{}({}{})",
            ret.llvm_name(),
            name,
            param_list,
            variadic
        );
    }

    fn create_function(
        &mut self,
        name: &str,
        params: &[(String, IrType)],
        ret: IrType,
        _linkage: Linkage,
    ) -> Self::Function {
        if !self.current_function.is_empty() {
            self.functions.push(std::mem::take(&mut self.current_function));
        }
        let param_list = params
            .iter()
            .map(|(pname, ty)| format!("{} %arg.{}", ty.llvm_name(), pname))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            self.current_function,
            "define {} @{}({}) {{",
            ret.llvm_name(),
            name,
            param_list
        );
        self.terminated = false;
        Function(name.to_string())
    }

    fn create_block(&mut self, _func: &Self::Function, label_hint: &str) -> Self::Block {
        Block(self.fresh_block(label_hint))
    }

    fn function_param(&self, _func: &Self::Function, name: &str) -> Self::Value {
        Value(format!("%arg.{name}"))
    }

    fn set_insert_point(&mut self, block: &Self::Block) {
        let _ = writeln!(self.current_function, "{}:", block.0);
        self.terminated = false;
    }

    fn current_block_terminated(&self) -> bool {
        self.terminated
    }

    fn const_int(&mut self, _ty: IrType, value: i64) -> Self::Value {
        Value(value.to_string())
    }

    fn const_float(&mut self, _ty: IrType, value: f64) -> Self::Value {
        Value(format!("{value:e}"))
    }

    fn const_null_ptr(&mut self) -> Self::Value {
        Value("null".to_string())
    }

    fn global_string(&mut self, bytes: &str) -> Self::Value {
        if let Some(existing) = self.string_constants.get(bytes) {
            return Value(existing.clone());
        }
        let global_name = format!("@.str.{}", self.string_counter);
        self.string_counter += 1;
        let escaped = Self::escape_llvm_string(bytes);
        let len = bytes.len() + 1;
        let _ = writeln!(
            self.string_globals,
            "{global_name} = private unnamed_addr constant [{len} x i8] c\"{escaped}\\00\""
        );
        self.string_constants.insert(bytes.to_string(), global_name.clone());
        Value(global_name)
    }

    fn alloca(&mut self, ty: IrType, name_hint: &str) -> Self::Value {
        let t = self.fresh_temp();
        let _ = writeln!(
            self.current_function,
            "  {t} = alloca {} ; {name_hint}",
            ty.llvm_name()
        );
        Value(t)
    }

    fn load(&mut self, ty: IrType, ptr: &Self::Value) -> Self::Value {
        let t = self.fresh_temp();
        let _ = writeln!(
            self.current_function,
            "  {t} = load {}, ptr {}",
            ty.llvm_name(),
            ptr.0
        );
        Value(t)
    }

    fn store(&mut self, ty: IrType, value: &Self::Value, ptr: &Self::Value) {
        let _ = writeln!(
            self.current_function,
            "  store {} {}, ptr {}",
            ty.llvm_name(),
            value.0,
            ptr.0
        );
    }

    fn gep(&mut self, elem_ty: IrType, base: &Self::Value, index: &Self::Value) -> Self::Value {
        let t = self.fresh_temp();
        let _ = writeln!(
            self.current_function,
            "  {t} = getelementptr {}, ptr {}, i64 {}",
            elem_ty.llvm_name(),
            base.0,
            index.0
        );
        Value(t)
    }

    fn build_binop(&mut self, op: ArithOp, ty: IrType, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value {
        let mnemonic = match op {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::SDiv => "sdiv",
            ArithOp::SRem => "srem",
            ArithOp::FAdd => "fadd",
            ArithOp::FSub => "fsub",
            ArithOp::FMul => "fmul",
            ArithOp::FDiv => "fdiv",
            ArithOp::FRem => "frem",
        };
        let t = self.fresh_temp();
        let _ = writeln!(
            self.current_function,
            "  {t} = {mnemonic} {} {}, {}",
            ty.llvm_name(),
            lhs.0,
            rhs.0
        );
        Value(t)
    }

    fn build_icmp(&mut self, pred: CmpPred, ty: IrType, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value {
        let p = match pred {
            CmpPred::Eq => "eq",
            CmpPred::Ne => "ne",
            CmpPred::Lt => "slt",
            CmpPred::Gt => "sgt",
            CmpPred::Le => "sle",
            CmpPred::Ge => "sge",
        };
        let t = self.fresh_temp();
        let _ = writeln!(self.current_function, "  {t} = icmp {p} {} {}, {}", ty.llvm_name(), lhs.0, rhs.0);
        Value(t)
    }

    fn build_fcmp(&mut self, pred: CmpPred, ty: IrType, lhs: &Self::Value, rhs: &Self::Value) -> Self::Value {
        // Ordered comparisons: NaN compares false (spec.md §4.4).
        let p = match pred {
            CmpPred::Eq => "oeq",
            CmpPred::Ne => "one",
            CmpPred::Lt => "olt",
            CmpPred::Gt => "ogt",
            CmpPred::Le => "ole",
            CmpPred::Ge => "oge",
        };
        let t = self.fresh_temp();
        let _ = writeln!(self.current_function, "  {t} = fcmp {p} {} {}, {}", ty.llvm_name(), lhs.0, rhs.0);
        Value(t)
    }

    fn build_cast(&mut self, op: CastOp, value: &Self::Value, from: IrType, to: IrType) -> Self::Value {
        let mnemonic = match op {
            CastOp::SignExtend => "sext",
            CastOp::Truncate => "trunc",
            CastOp::ZeroExtend => "zext",
            CastOp::SIToFP => "sitofp",
            CastOp::FPToSI => "fptosi",
            CastOp::FPExt => "fpext",
            CastOp::FPTrunc => "fptrunc",
            CastOp::BitcastPtr => "bitcast",
        };
        let t = self.fresh_temp();
        let _ = writeln!(
            self.current_function,
            "  {t} = {mnemonic} {} {} to {}",
            from.llvm_name(),
            value.0,
            to.llvm_name()
        );
        Value(t)
    }

    fn build_select(
        &mut self,
        cond: &Self::Value,
        if_true: &Self::Value,
        if_false: &Self::Value,
        ty: IrType,
    ) -> Self::Value {
        let t = self.fresh_temp();
        let _ = writeln!(
            self.current_function,
            "  {t} = select i1 {}, {} {}, {} {}",
            cond.0,
            ty.llvm_name(),
            if_true.0,
            ty.llvm_name(),
            if_false.0
        );
        Value(t)
    }

    fn build_br(&mut self, target: &Self::Block) {
        let _ = writeln!(self.current_function, "  br label %{}", target.0);
        self.terminated = true;
    }

    fn build_cond_br(&mut self, cond: &Self::Value, if_true: &Self::Block, if_false: &Self::Block) {
        let _ = writeln!(
            self.current_function,
            "  br i1 {}, label %{}, label %{}",
            cond.0, if_true.0, if_false.0
        );
        self.terminated = true;
    }

    fn build_call(&mut self, callee: &str, args: &[Self::Value], ret: IrType) -> Self::Value {
        let arg_list = args
            .iter()
            .map(|v| v.0.clone())
            .collect::<Vec<_>>()
            .join(", ");
        if ret == IrType::Void {
            let _ = writeln!(self.current_function, "  call void @{callee}({arg_list})");
            return Value(String::new());
        }
        let t = self.fresh_temp();
        let _ = writeln!(
            self.current_function,
            "  {t} = call {} @{callee}({arg_list})",
            ret.llvm_name()
        );
        Value(t)
    }

    fn build_ret(&mut self, value: Option<&Self::Value>, ty: IrType) {
        match value {
            Some(v) => {
                let _ = writeln!(self.current_function, "  ret {} {}", ty.llvm_name(), v.0);
            }
            None => {
                let _ = writeln!(self.current_function, "  ret void");
            }
        }
        self.terminated = true;
    }

    fn data_layout(&self) -> &str {
        &self.data_layout
    }

    fn target_triple(&self) -> &str {
        self.target_triple
    }

    fn serialize_to_object_file(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_function_has_exactly_one_terminator_per_block() {
        let mut sink = LlvmTextSink::new();
        sink.create_module("m");
        let f = sink.create_function("f", &[], IrType::I64, Linkage::External);
        let entry = sink.create_block(&f, "entry");
        sink.set_insert_point(&entry);
        let zero = sink.const_int(IrType::I64, 0);
        sink.build_ret(Some(&zero), IrType::I64);
        assert!(sink.current_block_terminated());
    }

    #[test]
    fn build_ret_emits_the_function_s_own_return_type() {
        let mut sink = LlvmTextSink::new();
        sink.create_module("m");
        let f = sink.create_function("f", &[], IrType::I32, Linkage::External);
        let entry = sink.create_block(&f, "entry");
        sink.set_insert_point(&entry);
        let zero = sink.const_int(IrType::I32, 0);
        sink.build_ret(Some(&zero), IrType::I32);
        assert!(sink.current_function.contains("ret i32 "));
        assert!(!sink.current_function.contains("ret i64"));
    }

    #[test]
    fn string_globals_are_deduplicated() {
        let mut sink = LlvmTextSink::new();
        let a = sink.global_string("hi");
        let b = sink.global_string("hi");
        assert_eq!(a.0, b.0);
        assert_eq!(sink.string_globals.matches("@.str.").count(), 1);
    }

    #[test]
    fn render_includes_target_triple_and_declarations() {
        let mut sink = LlvmTextSink::new();
        sink.create_module("m");
        sink.declare_external("malloc", &[IrType::I64], IrType::Ptr);
        let rendered = sink.render();
        assert!(rendered.contains("target triple"));
        assert!(rendered.contains("declare ptr @malloc(i64)"));
    }
}
