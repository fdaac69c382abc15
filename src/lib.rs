//! Ahead-of-time compiler core for the Quanta scripting language.
//!
//! Orchestration shape grounded on
//! `examples/navicore-cem3/crates/compiler/src/lib.rs`: thread one
//! `Diagnostics` through lex -> parse -> lower -> backend, and let the
//! driver decide at each boundary whether to keep going.

pub mod ast;
pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod ir;
pub mod lower;
pub mod parser;
pub mod registry;
pub mod runtime;
pub mod token;
pub mod types;

use std::path::Path;

use diagnostics::Diagnostics;
use ir::llvm_text::LlvmTextSink;
use parser::{parse_source, ModuleLoader};
use registry::FunctionRegistry;

/// Result of a full compile: accumulated diagnostics plus, if the build
/// reached the backend stage cleanly, the serialized IR text.
pub struct CompileOutput {
    pub diagnostics: Diagnostics,
    pub ir_text: Option<String>,
}

impl CompileOutput {
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.had_error() && self.ir_text.is_some()
    }
}

/// Compile one already-read source string. `loader` resolves any
/// `import` statements it contains.
pub fn compile_source(source: &str, loader: &dyn ModuleLoader) -> CompileOutput {
    let mut diags = Diagnostics::new();
    let program = parse_source(source, &mut diags, loader);

    let mut registry = FunctionRegistry::new();
    for func in &program.funcs {
        registry.register(func);
    }

    if diags.had_error() {
        return CompileOutput { diagnostics: diags, ir_text: None };
    }

    let mut sink = LlvmTextSink::new();
    lower::lower_program(&program, &registry, &mut sink, &mut diags);

    if diags.had_error() {
        return CompileOutput { diagnostics: diags, ir_text: None };
    }

    CompileOutput { ir_text: Some(sink.render()), diagnostics: diags }
}

/// Compile a source file from disk, resolving imports relative to its
/// directory and the current working directory (`spec.md` §6). Reading
/// the file is the one disk access the core itself performs; writing the
/// resulting object file is the caller's job via `backend::emit_object_file`.
pub fn compile_file(path: &Path, config: &config::CompilerConfig) -> CompileOutput {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            let mut diags = Diagnostics::new();
            diags.error(diagnostics::Stage::Io, None, format!("cannot read '{}': {e}", path.display()));
            return CompileOutput { diagnostics: diags, ir_text: None };
        }
    };
    let loader = parser::root_and_cwd_loader_with_extra(path, config.import_search_path.clone());
    compile_source(&source, &loader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::NoImports;

    #[test]
    fn compiles_a_trivial_print_program() {
        let out = compile_source("print(1 + 2 * 3);", &NoImports);
        assert!(!out.diagnostics.had_error());
        let ir = out.ir_text.unwrap();
        assert!(ir.contains("define"));
        assert!(ir.contains("@main"));
    }

    #[test]
    fn parser_error_skips_lowering_and_backend() {
        let out = compile_source("void main() { int x = ; }", &NoImports);
        assert!(out.diagnostics.had_error());
        assert!(out.ir_text.is_none());
    }

    #[test]
    fn function_call_with_default_argument() {
        let src = "int add(int a, int b = 10) { return a + b; } void main() { print(add(a=1)); }";
        let out = compile_source(src, &NoImports);
        assert!(!out.diagnostics.had_error());
        assert!(out.ir_text.unwrap().contains("@add"));
    }
}
