use std::fmt;
use std::sync::Arc;

use rhai::{AST, Dynamic, Engine, EvalAltResult, Scope};

use super::{SynthesizedFunction, defaults};
use crate::config::DEFAULT_MAX_OPERATIONS;
use crate::declaration::FunctionDeclaration;
use crate::error::SynthesisError;

/// Registers native functions on an engine
pub type Registrar = Arc<dyn Fn(&mut Engine) + Send + Sync>;

/// A caller-supplied function the generated code may call without defining it.
///
/// Helpers are capabilities injected into every candidate engine as native
/// functions under their declared name. Script helpers keep running in their
/// own engine and unit, so only the declared name is visible to the
/// candidate. A helper takes precedence over anything the agent defines under
/// the same name.
#[derive(Clone)]
pub struct Helper {
    declaration: FunctionDeclaration,
    natives: Vec<Registrar>,
}

impl Helper {
    /// A helper implemented in Rhai.
    ///
    /// `source` must define a top-level function named after the declaration
    /// and taking every declared parameter. Top-level statements in `source`
    /// are discarded.
    pub fn script(declaration: FunctionDeclaration, source: &str) -> Result<Self, SynthesisError> {
        defaults::check(&declaration)?;

        let mut engine = Engine::new();
        engine.set_max_operations(DEFAULT_MAX_OPERATIONS);

        let ast = engine.compile(source).map_err(|e| {
            SynthesisError::malformed(
                &declaration.name,
                format!("helper source does not compile: {}", e),
            )
        })?;

        let arity = declaration.params.len();
        if !ast
            .iter_functions()
            .any(|f| f.name == declaration.name && f.params.len() == arity)
        {
            return Err(SynthesisError::malformed(
                &declaration.name,
                format!(
                    "helper source does not define a function called {:?} with {} parameters",
                    declaration.name, arity
                ),
            ));
        }

        let unit = defaults::apply(&engine, ast.clone_functions_only(), &declaration)
            .map_err(|reason| SynthesisError::malformed(&declaration.name, reason))?;

        Ok(Self::isolated(declaration, Arc::new(engine), unit))
    }

    /// A helper implemented in Rust.
    ///
    /// `register` is called on every engine that loads a candidate and should
    /// register the declared name, e.g. `engine.register_fn("scale", |x: f64| x * 10.0)`.
    pub fn native(
        declaration: FunctionDeclaration,
        register: impl Fn(&mut Engine) + Send + Sync + 'static,
    ) -> Self {
        Self {
            declaration,
            natives: vec![Arc::new(register)],
        }
    }

    /// Expose the declared entry point of `unit`, run by `engine`, under its name.
    fn isolated(declaration: FunctionDeclaration, engine: Arc<Engine>, unit: AST) -> Self {
        let call = UnitCall {
            engine,
            unit: Arc::new(unit),
            name: declaration.name.clone(),
        };
        let arities = defaults::arities(&declaration);
        let register = move |engine: &mut Engine| {
            for arity in arities.clone() {
                call.register(engine, arity);
            }
        };

        Self {
            declaration,
            natives: vec![Arc::new(register)],
        }
    }

    pub fn declaration(&self) -> &FunctionDeclaration {
        &self.declaration
    }

    pub fn name(&self) -> &str {
        &self.declaration.name
    }

    pub(crate) fn install(&self, engine: &mut Engine) {
        for register in &self.natives {
            register(engine);
        }
    }
}

/// A synthesized function can serve as a helper for later syntheses. It keeps
/// running in its own engine, so its other functions stay private.
impl From<&SynthesizedFunction> for Helper {
    fn from(function: &SynthesizedFunction) -> Self {
        Self::isolated(
            function.declaration().clone(),
            function.engine(),
            function.unit().clone(),
        )
    }
}

impl fmt::Debug for Helper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helper")
            .field("name", &self.declaration.name)
            .field("natives", &self.natives.len())
            .finish()
    }
}

/// Forwards calls from a candidate engine into a helper's own engine and unit
#[derive(Clone)]
struct UnitCall {
    engine: Arc<Engine>,
    unit: Arc<AST>,
    name: String,
}

macro_rules! register_arity {
    ($engine:expr, $call:expr $(, $arg:ident)*) => {{
        let call = $call.clone();
        let name = call.name.clone();
        $engine.register_fn(name, move |$($arg: Dynamic),*| call.invoke(vec![$($arg),*]));
    }};
}

impl UnitCall {
    fn invoke(&self, args: Vec<Dynamic>) -> Result<Dynamic, Box<EvalAltResult>> {
        self.engine
            .call_fn::<Dynamic>(&mut Scope::new(), &self.unit, &self.name, args)
    }

    fn register(&self, engine: &mut Engine, arity: usize) {
        match arity {
            0 => register_arity!(engine, self),
            1 => register_arity!(engine, self, a),
            2 => register_arity!(engine, self, a, b),
            3 => register_arity!(engine, self, a, b, c),
            4 => register_arity!(engine, self, a, b, c, d),
            5 => register_arity!(engine, self, a, b, c, d, e),
            6 => register_arity!(engine, self, a, b, c, d, e, f),
            7 => register_arity!(engine, self, a, b, c, d, e, f, g),
            8 => register_arity!(engine, self, a, b, c, d, e, f, g, h),
            _ => tracing::warn!(
                helper = %self.name,
                arity,
                max = defaults::MAX_PARAMS,
                "helper arity not supported, skipping"
            ),
        }
    }
}
