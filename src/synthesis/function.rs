use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rhai::{AST, Engine, FuncArgs, Scope};

use crate::declaration::{FunctionDeclaration, FunctionMetadata, normalize_doc};
use crate::error::SynthesisError;

/// An accepted implementation of a declared function.
///
/// Identity (name, signature, doc) comes from the declaration, never from the
/// generated code. The unit holds only functions: the candidate's plus the
/// overloads that fill in declared defaults. Helpers live on the engine.
#[derive(Clone)]
pub struct SynthesizedFunction {
    declaration: FunctionDeclaration,
    engine: Arc<Engine>,
    unit: AST,
    source_path: PathBuf,
    attempts: u32,
}

impl SynthesizedFunction {
    pub(crate) fn new(
        declaration: FunctionDeclaration,
        engine: Engine,
        unit: AST,
        source_path: PathBuf,
    ) -> Self {
        Self {
            declaration,
            engine: Arc::new(engine),
            unit,
            source_path,
            attempts: 0,
        }
    }

    pub(crate) fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    pub fn signature(&self) -> String {
        self.declaration.signature()
    }

    pub fn doc(&self) -> String {
        normalize_doc(&self.declaration.doc)
    }

    pub fn metadata(&self) -> FunctionMetadata {
        self.declaration.metadata()
    }

    pub fn declaration(&self) -> &FunctionDeclaration {
        &self.declaration
    }

    /// Where the accepted source was written
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Number of attempts the synthesis took
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Call the entry point.
    ///
    /// ```no_run
    /// # fn example(mean: &fnsynth::SynthesizedFunction) -> Result<(), fnsynth::SynthesisError> {
    /// use rhai::Dynamic;
    ///
    /// let values: rhai::Array = vec![
    ///     Dynamic::from_float(0.0),
    ///     Dynamic::from_float(5.0),
    ///     Dynamic::from_float(10.0),
    /// ];
    /// let m: f64 = mean.call((values,))?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn call<T>(&self, args: impl FuncArgs) -> Result<T, SynthesisError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.engine
            .call_fn::<T>(&mut Scope::new(), &self.unit, &self.declaration.name, args)
            .map_err(|e| SynthesisError::Call {
                name: self.declaration.name.clone(),
                message: e.to_string(),
            })
    }

    /// Evaluate an expression with the entry point and helpers in scope.
    pub fn eval<T>(&self, expression: &str) -> Result<T, SynthesisError>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.evaluate(expression).map_err(|message| SynthesisError::Call {
            name: self.declaration.name.clone(),
            message,
        })
    }

    /// Evaluate in an empty scope: only the unit's functions, native helpers
    /// and engine built-ins are visible.
    pub(crate) fn evaluate<T>(&self, expression: &str) -> Result<T, String>
    where
        T: Clone + Send + Sync + 'static,
    {
        let probe = self
            .engine
            .compile_expression(expression)
            .map_err(|e| e.to_string())?;
        let probe = self.unit.merge(&probe);

        self.engine
            .eval_ast_with_scope::<T>(&mut Scope::new(), &probe)
            .map_err(|e| e.to_string())
    }

    pub(crate) fn unit(&self) -> &AST {
        &self.unit
    }

    pub(crate) fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.engine)
    }
}

impl fmt::Debug for SynthesizedFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesizedFunction")
            .field("signature", &self.signature())
            .field("source_path", &self.source_path)
            .field("attempts", &self.attempts)
            .finish()
    }
}
