//! Backend driver: asks an `IrSink` to serialize itself to an object
//! file, skipping the stage entirely when earlier phases already
//! accumulated errors (`spec.md` §5/§7 — never hand a half-typed program
//! to codegen).

use std::path::Path;

use crate::diagnostics::Diagnostics;
use crate::ir::IrSink;

pub fn emit_object_file<S: IrSink>(sink: &S, diags: &Diagnostics, path: &Path) -> std::io::Result<bool> {
    if diags.had_error() {
        return Ok(false);
    }
    sink.serialize_to_object_file(path)?;
    Ok(true)
}
