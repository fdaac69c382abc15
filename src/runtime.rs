//! Runtime shim: declarations of external helper functions the emitter
//! calls (`spec.md` §6). Implementing these is out of scope for the core
//! — they are specified here only as `extern "C"` signatures an `IrSink`
//! can turn into `declare` statements.
//!
//! Data-driven table, grounded on
//! `examples/navicore-cem3/crates/compiler/src/codegen/runtime.rs`
//! (`RUNTIME_DECLARATIONS`), which centralizes the same kind of list to
//! avoid hundreds of duplicate `writeln!` calls.

use std::sync::LazyLock;

use crate::ir::IrType;

/// One external runtime function's C-callable signature.
#[derive(Debug, Clone)]
pub struct RuntimeFn {
    pub name: &'static str,
    pub params: &'static [IrType],
    pub ret: IrType,
}

pub static RUNTIME_FUNCTIONS: LazyLock<Vec<RuntimeFn>> = LazyLock::new(|| {
    use IrType::*;
    vec![
        // Allocator
        RuntimeFn { name: "malloc", params: &[I64], ret: Ptr },
        RuntimeFn { name: "free", params: &[Ptr], ret: Void },
        RuntimeFn { name: "realloc", params: &[Ptr, I64], ret: Ptr },
        // C string primitives
        RuntimeFn { name: "strlen", params: &[Ptr], ret: I64 },
        RuntimeFn { name: "strcpy", params: &[Ptr, Ptr], ret: Ptr },
        RuntimeFn { name: "strcat", params: &[Ptr, Ptr], ret: Ptr },
        RuntimeFn { name: "strcmp", params: &[Ptr, Ptr], ret: I32 },
        RuntimeFn { name: "printf", params: &[Ptr], ret: I32 },
        RuntimeFn { name: "fflush", params: &[Ptr], ret: I32 },
        // Allocating string helpers (heap-returning, tracked by the
        // auto-free sweep at the call site).
        RuntimeFn { name: "upper", params: &[Ptr], ret: Ptr },
        RuntimeFn { name: "lower", params: &[Ptr], ret: Ptr },
        RuntimeFn { name: "reverse", params: &[Ptr], ret: Ptr },
        RuntimeFn { name: "strip", params: &[Ptr], ret: Ptr },
        RuntimeFn { name: "lstrip", params: &[Ptr], ret: Ptr },
        RuntimeFn { name: "rstrip", params: &[Ptr], ret: Ptr },
        RuntimeFn { name: "capitalize", params: &[Ptr], ret: Ptr },
        RuntimeFn { name: "title", params: &[Ptr], ret: Ptr },
        RuntimeFn { name: "replace", params: &[Ptr, Ptr, Ptr], ret: Ptr },
        RuntimeFn { name: "slice", params: &[Ptr, I32, I32, I32], ret: Ptr },
        // Non-allocating string predicates/queries
        RuntimeFn { name: "isupper", params: &[Ptr], ret: I32 },
        RuntimeFn { name: "islower", params: &[Ptr], ret: I32 },
        RuntimeFn { name: "isalpha", params: &[Ptr], ret: I32 },
        RuntimeFn { name: "isdigit", params: &[Ptr], ret: I32 },
        RuntimeFn { name: "isspace", params: &[Ptr], ret: I32 },
        RuntimeFn { name: "isalnum", params: &[Ptr], ret: I32 },
        RuntimeFn { name: "find", params: &[Ptr, Ptr], ret: I32 },
        RuntimeFn { name: "count", params: &[Ptr, Ptr], ret: I32 },
        RuntimeFn { name: "startswith", params: &[Ptr, Ptr], ret: I32 },
        RuntimeFn { name: "endswith", params: &[Ptr, Ptr], ret: I32 },
    ]
});

/// Allocating string operations: the IR emitter must track the returned
/// pointer in the owning function's auto-free list (`spec.md` §4.3).
pub const ALLOCATING_STRING_METHODS: &[&str] = &[
    "upper", "lower", "reverse", "strip", "lstrip", "rstrip", "capitalize", "title", "replace",
];

/// Non-allocating string methods: return a plain scalar, no tracking.
pub const SCALAR_STRING_METHODS: &[&str] = &[
    "len",
    "isupper",
    "islower",
    "isalpha",
    "isdigit",
    "isspace",
    "isalnum",
    "find",
    "count",
    "startswith",
    "endswith",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_allocating_method_has_a_runtime_declaration() {
        for name in ALLOCATING_STRING_METHODS {
            assert!(
                RUNTIME_FUNCTIONS.iter().any(|f| &f.name == name),
                "missing runtime decl for {name}"
            );
        }
    }

    #[test]
    fn malloc_and_free_round_trip_signature() {
        let malloc = RUNTIME_FUNCTIONS.iter().find(|f| f.name == "malloc").unwrap();
        assert_eq!(malloc.ret, IrType::Ptr);
        let free = RUNTIME_FUNCTIONS.iter().find(|f| f.name == "free").unwrap();
        assert_eq!(free.params, &[IrType::Ptr]);
    }
}
