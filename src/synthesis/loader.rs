use anyhow::{Context, Result};
use rhai::Engine;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::{Helper, SynthesizedFunction, defaults};
use crate::declaration::FunctionDeclaration;

/// Why a candidate could not become a unit. Both cases are fed back to the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    /// The source failed to parse or its top-level statements raised
    Load { trace: String },
    /// The unit has no top-level function with the declared name
    MissingEntryPoint { expected: String },
}

/// Turns candidate source into an executable unit.
///
/// Each candidate gets a fresh engine: helpers are registered on it and
/// replace same-named candidate functions, the unit's top-level statements run
/// once to surface load-time errors, and declared defaults become overloads.
pub struct CandidateLoader {
    implementations: PathBuf,
    max_operations: u64,
}

impl CandidateLoader {
    pub fn new(cache_root: impl AsRef<Path>, max_operations: u64) -> Self {
        Self {
            implementations: cache_root.as_ref().join("implementations"),
            max_operations,
        }
    }

    /// `<cache_root>/implementations/<name>.rhai`
    pub fn implementation_path(&self, name: &str) -> PathBuf {
        self.implementations.join(format!("{}.rhai", name))
    }

    /// Write the candidate to its per-name file, replacing the previous attempt.
    pub fn persist(&self, name: &str, code: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.implementations).with_context(|| {
            format!(
                "failed to create directory: {}",
                self.implementations.display()
            )
        })?;

        let path = self.implementation_path(name);
        std::fs::write(&path, code)
            .with_context(|| format!("failed to write implementation: {}", path.display()))?;

        debug!(path = %path.display(), bytes = code.len(), "persisted candidate");
        Ok(path)
    }

    pub fn load(
        &self,
        declaration: &FunctionDeclaration,
        code: &str,
        helpers: &[Helper],
        source_path: PathBuf,
    ) -> Result<SynthesizedFunction, LoadFailure> {
        let mut engine = Engine::new();
        engine.set_max_operations(self.max_operations);
        for helper in helpers {
            helper.install(&mut engine);
        }

        let mut unit = engine.compile(code).map_err(|e| LoadFailure::Load {
            trace: format!("parse error: {}", e),
        })?;

        // Script functions shadow natives, so helper names are taken away from the candidate
        let helper_names: HashSet<&str> = helpers.iter().map(Helper::name).collect();
        unit.retain_functions(|_, _, name, _| !helper_names.contains(name));

        engine.run_ast(&unit).map_err(|e| LoadFailure::Load {
            trace: format!("runtime error: {}", e),
        })?;

        if !unit.iter_functions().any(|f| f.name == declaration.name) {
            return Err(LoadFailure::MissingEntryPoint {
                expected: declaration.name.clone(),
            });
        }

        let unit = defaults::apply(&engine, unit.clone_functions_only(), declaration)
            .map_err(|trace| LoadFailure::Load { trace })?;

        Ok(SynthesizedFunction::new(
            declaration.clone(),
            engine,
            unit,
            source_path,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::INT;
    use tempfile::TempDir;

    fn double() -> FunctionDeclaration {
        FunctionDeclaration::new("double").untyped_param("x")
    }

    fn loader(dir: &TempDir) -> CandidateLoader {
        CandidateLoader::new(dir.path(), 1_000_000)
    }

    #[test]
    fn persist_overwrites_previous_attempt() {
        let dir = TempDir::new().expect("create temp dir");
        let loader = loader(&dir);

        loader.persist("double", "fn double(x) { x }").expect("persist");
        let path = loader.persist("double", "fn double(x) { x * 2 }").expect("persist");

        assert_eq!(path, dir.path().join("implementations").join("double.rhai"));
        assert_eq!(
            std::fs::read_to_string(&path).expect("read"),
            "fn double(x) { x * 2 }"
        );
    }

    #[test]
    fn loads_entry_point() {
        let dir = TempDir::new().expect("create temp dir");
        let function = loader(&dir)
            .load(&double(), "fn double(x) { x * 2 }", &[], PathBuf::new())
            .expect("load");
        assert_eq!(function.call::<INT>((21 as INT,)).expect("call"), 42);
    }

    #[test]
    fn syntax_errors_are_load_failures() {
        let dir = TempDir::new().expect("create temp dir");
        let failure = loader(&dir)
            .load(&double(), "fn double(x) { x * }", &[], PathBuf::new())
            .unwrap_err();
        match failure {
            LoadFailure::Load { trace } => assert!(trace.starts_with("parse error")),
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[test]
    fn top_level_errors_are_load_failures() {
        let dir = TempDir::new().expect("create temp dir");
        let code = "fn double(x) { x * 2 }\nthrow \"boom\";";
        let failure = loader(&dir)
            .load(&double(), code, &[], PathBuf::new())
            .unwrap_err();
        match failure {
            LoadFailure::Load { trace } => {
                assert!(trace.starts_with("runtime error"));
                assert!(trace.contains("boom"));
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let dir = TempDir::new().expect("create temp dir");
        let failure = loader(&dir)
            .load(&double(), "fn twice(x) { x * 2 }", &[], PathBuf::new())
            .unwrap_err();
        assert_eq!(
            failure,
            LoadFailure::MissingEntryPoint {
                expected: "double".to_string()
            }
        );
    }

    #[test]
    fn script_helper_overrides_candidate_definition() {
        let dir = TempDir::new().expect("create temp dir");
        let helper = Helper::script(
            FunctionDeclaration::new("offset").untyped_param("x"),
            "fn offset(x) { x + 1000 }",
        )
        .expect("helper");
        let code = "fn offset(x) { x + 1 }\nfn double(x) { offset(x) * 2 }";

        let function = loader(&dir)
            .load(&double(), code, &[helper], PathBuf::new())
            .expect("load");

        assert_eq!(function.call::<INT>((1 as INT,)).expect("call"), 2002);
    }

    #[test]
    fn native_helper_overrides_candidate_definition() {
        let dir = TempDir::new().expect("create temp dir");
        let helper = Helper::native(
            FunctionDeclaration::new("offset").param("x", "int"),
            |engine: &mut Engine| {
                engine.register_fn("offset", |x: INT| x + 1000);
            },
        );
        let code = "fn offset(x) { x + 1 }\nfn double(x) { offset(x) * 2 }";

        let function = loader(&dir)
            .load(&double(), code, &[helper], PathBuf::new())
            .expect("load");

        assert_eq!(function.call::<INT>((1 as INT,)).expect("call"), 2002);
    }

    #[test]
    fn declared_defaults_fill_missing_arguments() {
        let dir = TempDir::new().expect("create temp dir");
        let scale = FunctionDeclaration::new("scale")
            .param("x", "int")
            .param_with_default("k", "int", "2");

        let function = loader(&dir)
            .load(&scale, "fn scale(x, k) { x * k }", &[], PathBuf::new())
            .expect("load");

        assert_eq!(function.call::<INT>((3 as INT,)).expect("call"), 6);
        assert_eq!(function.call::<INT>((3 as INT, 3 as INT)).expect("call"), 9);
    }

    #[test]
    fn runaway_top_level_code_is_stopped() {
        let dir = TempDir::new().expect("create temp dir");
        let code = "fn double(x) { x * 2 }\nloop { }";
        let failure = CandidateLoader::new(dir.path(), 10_000)
            .load(&double(), code, &[], PathBuf::new())
            .unwrap_err();
        assert!(matches!(failure, LoadFailure::Load { .. }));
    }
}
