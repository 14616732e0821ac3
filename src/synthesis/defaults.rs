use std::collections::HashSet;
use std::ops::RangeInclusive;

use rhai::{AST, Engine};

use crate::declaration::FunctionDeclaration;
use crate::error::SynthesisError;

/// Most parameters a helper entry point can be exposed with
pub(crate) const MAX_PARAMS: usize = 8;

/// Argument counts a caller may use. Every parameter from the first default
/// on is optional.
pub(crate) fn arities(declaration: &FunctionDeclaration) -> RangeInclusive<usize> {
    let required = declaration
        .params
        .iter()
        .take_while(|p| p.default.is_none())
        .count();
    required..=declaration.params.len()
}

/// Reject declarations whose defaults could never be applied.
pub(crate) fn check(declaration: &FunctionDeclaration) -> Result<(), SynthesisError> {
    let name = &declaration.name;
    if declaration.params.len() > MAX_PARAMS {
        return Err(SynthesisError::malformed(
            name,
            format!("at most {} parameters are supported", MAX_PARAMS),
        ));
    }

    let required = *arities(declaration).start();
    if let Some(param) = declaration.params[required..]
        .iter()
        .find(|p| p.default.is_none())
    {
        return Err(SynthesisError::malformed(
            name,
            format!(
                "parameter {:?} has no default but follows one that does",
                param.name
            ),
        ));
    }

    if let Some(source) = overload_source(declaration) {
        Engine::new().compile(&source).map_err(|e| {
            SynthesisError::malformed(name, format!("default values do not compile: {}", e))
        })?;
    }

    Ok(())
}

/// Rhai has no default parameters. Each shorter arity becomes an overload
/// forwarding to the full-arity function with the declared default text.
fn overload_source(declaration: &FunctionDeclaration) -> Option<String> {
    let arities = arities(declaration);
    let full = *arities.end();

    let overloads: Vec<String> = (*arities.start()..full)
        .map(|arity| {
            let params: Vec<&str> = declaration.params[..arity]
                .iter()
                .map(|p| p.name.as_str())
                .collect();
            let args: Vec<&str> = params
                .iter()
                .copied()
                .chain(
                    declaration.params[arity..]
                        .iter()
                        .map(|p| p.default.as_deref().unwrap_or("()")),
                )
                .collect();
            format!(
                "fn {name}({}) {{ {name}({}) }}",
                params.join(", "),
                args.join(", "),
                name = declaration.name
            )
        })
        .collect();

    (!overloads.is_empty()).then(|| overloads.join("\n"))
}

/// Add a forwarding overload for every optional arity `unit` does not define itself.
pub(crate) fn apply(
    engine: &Engine,
    unit: AST,
    declaration: &FunctionDeclaration,
) -> Result<AST, String> {
    let Some(source) = overload_source(declaration) else {
        return Ok(unit);
    };
    let mut overloads = engine
        .compile(&source)
        .map_err(|e| format!("default values do not compile: {}", e))?;

    let defined: HashSet<usize> = unit
        .iter_functions()
        .filter(|f| f.name == declaration.name)
        .map(|f| f.params.len())
        .collect();
    overloads.retain_functions(|_, _, _, arity| !defined.contains(&arity));

    Ok(unit.merge(&overloads))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::{INT, Scope};

    fn scale() -> FunctionDeclaration {
        FunctionDeclaration::new("scale")
            .param("x", "int")
            .param_with_default("k", "int", "2")
            .param_with_default("offset", "int", "0")
    }

    #[test]
    fn optional_arities_start_at_first_default() {
        assert_eq!(arities(&scale()), 1..=3);
        assert_eq!(arities(&FunctionDeclaration::new("f")), 0..=0);
    }

    #[test]
    fn overloads_forward_declared_defaults() {
        let engine = Engine::new();
        let unit = engine
            .compile("fn scale(x, k, offset) { x * k + offset }")
            .expect("compile");
        let unit = apply(&engine, unit, &scale()).expect("apply");

        let call = |args: Vec<INT>| {
            engine
                .call_fn::<INT>(&mut Scope::new(), &unit, "scale", args)
                .expect("call")
        };
        assert_eq!(call(vec![3]), 6);
        assert_eq!(call(vec![3, 3]), 9);
        assert_eq!(call(vec![3, 3, 1]), 10);
    }

    #[test]
    fn own_overloads_are_kept() {
        let engine = Engine::new();
        let unit = engine
            .compile("fn scale(x, k, offset) { x * k + offset }\nfn scale(x) { -1 }")
            .expect("compile");
        let unit = apply(&engine, unit, &scale()).expect("apply");

        let result = engine
            .call_fn::<INT>(&mut Scope::new(), &unit, "scale", (3 as INT,))
            .expect("call");
        assert_eq!(result, -1);
        assert_eq!(unit.iter_functions().count(), 3);
    }

    #[test]
    fn required_after_default_is_malformed() {
        let declaration = FunctionDeclaration::new("f")
            .param_with_default("a", "int", "1")
            .param("b", "int");
        let err = check(&declaration).unwrap_err();
        assert!(err.to_string().contains("\"b\" has no default"));
    }

    #[test]
    fn unparsable_default_is_malformed() {
        let declaration = FunctionDeclaration::new("f").param_with_default("a", "int", "1 +");
        assert!(matches!(
            check(&declaration),
            Err(SynthesisError::MalformedRequest { .. })
        ));
        assert!(check(&scale()).is_ok());
    }
}
