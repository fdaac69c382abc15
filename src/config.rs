//! Compiler configuration, grounded on
//! `examples/navicore-cem3/crates/compiler/src/config.rs`'s
//! `CompilerConfig`/`OptimizationLevel` shape. Carries knobs orthogonal to
//! the AST; `toml`-deserializable so a project can ship `quanta.toml`.

use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizationLevel {
    #[default]
    O0,
    O1,
    O2,
    O3,
}

/// Compiler-wide knobs. Interpreting `optimization_level` is the concrete
/// backend's job, not the core's — this struct only records the request.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CompilerConfig {
    #[serde(default)]
    pub optimization_level: OptimizationLevel,

    /// Extra directories searched for `import`ed modules, in addition to
    /// the source file's own directory and the current working directory.
    #[serde(default)]
    pub import_search_path: Vec<PathBuf>,

    /// Emit diagnostics as well-formed text to stderr (the only option the
    /// core supports; a machine-readable mode is a natural follow-up but
    /// is not implemented here).
    #[serde(default)]
    pub emit_diagnostics_json: bool,
}

impl CompilerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| format!("invalid compiler config: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_o0_and_no_extra_search_paths() {
        let config = CompilerConfig::default();
        assert_eq!(config.optimization_level, OptimizationLevel::O0);
        assert!(config.import_search_path.is_empty());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config = CompilerConfig::from_toml_str("optimization_level = \"o2\"").unwrap();
        assert_eq!(config.optimization_level, OptimizationLevel::O2);
    }
}
