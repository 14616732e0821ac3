use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use super::FunctionDeclaration;
use crate::config::SynthesisRequest;
use crate::error::SynthesisError;
use crate::synthesis::Helper;

/// A TOML file of helper and function declarations.
///
/// ```toml
/// [[helper]]
/// name = "mean"
/// params = [{ name = "ls", type = "array<float>" }]
/// source = "fn mean(ls) { ls.reduce(|s, x| s + x, 0.0) / ls.len() }"
///
/// [[function]]
/// name = "variance"
/// doc = "Population variance of an array of floats."
/// params = [{ name = "ls", type = "array<float>" }]
/// returns = "float"
/// examples = ["variance([1.0, 2.0, 3.0])"]
///
/// [function.synthesis]
/// helpers = ["mean"]
/// tests = ["variance([2.0, 2.0]) == 0.0"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeclarationFile {
    #[serde(default, rename = "helper")]
    pub helpers: Vec<HelperSource>,
    #[serde(default, rename = "function")]
    pub functions: Vec<DeclaredFunction>,
}

/// A declared function and the raw `synthesis` table that configures it
#[derive(Debug, Clone, Deserialize)]
pub struct DeclaredFunction {
    #[serde(flatten)]
    pub declaration: FunctionDeclaration,
    /// Expressions evaluated and printed once the function is synthesized
    #[serde(default)]
    pub examples: Vec<String>,
    /// Kept untyped so a bad table fails this function only, not the whole file
    #[serde(default)]
    pub synthesis: Option<toml::Value>,
}

/// A helper implemented in Rhai, shipped alongside the declarations
#[derive(Debug, Clone, Deserialize)]
pub struct HelperSource {
    #[serde(flatten)]
    pub declaration: FunctionDeclaration,
    pub source: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RequestSpec {
    model: Option<String>,
    sketch: Option<String>,
    #[serde(default)]
    helpers: Vec<String>,
    #[serde(default)]
    tests: Vec<String>,
    max_attempts: Option<u32>,
    log: Option<bool>,
    debug: Option<bool>,
    max_operations: Option<u64>,
}

impl DeclarationFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read declarations: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("invalid declarations: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn function(&self, name: &str) -> Option<&DeclaredFunction> {
        self.functions.iter().find(|f| f.declaration.name == name)
    }
}

impl DeclaredFunction {
    /// Build the synthesis request from the `synthesis` table.
    ///
    /// `default_model` applies when the table names no model. Helper names
    /// are resolved against `helpers`.
    pub fn request(
        &self,
        default_model: &str,
        helpers: &HashMap<String, Helper>,
    ) -> Result<SynthesisRequest, SynthesisError> {
        let name = &self.declaration.name;

        let table = match &self.synthesis {
            None => {
                return Err(SynthesisError::malformed(
                    name,
                    "declaration has no [synthesis] table",
                ));
            }
            Some(value @ toml::Value::Table(_)) => value.clone(),
            Some(other) => {
                return Err(SynthesisError::malformed(
                    name,
                    format!("synthesis must be a table, found {}", other.type_str()),
                ));
            }
        };

        let spec: RequestSpec = table
            .try_into()
            .map_err(|e: toml::de::Error| SynthesisError::malformed(name, e.message().trim()))?;

        let mut request = SynthesisRequest::new()
            .model(spec.model.unwrap_or_else(|| default_model.to_string()))
            .tests(spec.tests);

        if let Some(sketch) = spec.sketch {
            request = request.sketch(sketch);
        }
        if let Some(max_attempts) = spec.max_attempts {
            request = request.max_attempts(max_attempts);
        }
        if let Some(log) = spec.log {
            request = request.log(log);
        }
        if let Some(debug) = spec.debug {
            request = request.debug(debug);
        }
        if let Some(max_operations) = spec.max_operations {
            request = request.max_operations(max_operations);
        }

        for helper_name in &spec.helpers {
            let helper = helpers.get(helper_name).ok_or_else(|| {
                SynthesisError::malformed(name, format!("unknown helper {:?}", helper_name))
            })?;
            request = request.helper(helper.clone());
        }

        Ok(request)
    }
}

impl HelperSource {
    pub fn to_helper(&self) -> Result<Helper, SynthesisError> {
        Helper::script(self.declaration.clone(), &self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEAN_AND_VARIANCE: &str = r#"
[[helper]]
name = "square"
params = [{ name = "x", type = "float" }]
source = "fn square(x) { x * x }"

[[function]]
name = "mean"
doc = "Returns the mean of an array of floats."
params = [{ name = "ls", type = "array<float>" }]
returns = "float"
examples = ["mean([1.0, 2.0])"]

[function.synthesis]
tests = ["mean([1.0, 2.0, 3.0]) == 2.0"]
max_attempts = 3

[[function]]
name = "variance"
params = [{ name = "ls", type = "array<float>" }]

[function.synthesis]
model = "gpt-4o-mini"
helpers = ["square", "mean"]
log = false
"#;

    fn helpers(file: &DeclarationFile) -> HashMap<String, Helper> {
        file.helpers
            .iter()
            .map(|h| (h.declaration.name.clone(), h.to_helper().expect("helper")))
            .collect()
    }

    #[test]
    fn parses_functions_and_helpers() {
        let file = DeclarationFile::parse(MEAN_AND_VARIANCE).expect("parse");

        assert_eq!(file.helpers.len(), 1);
        assert_eq!(file.functions.len(), 2);

        let mean = file.function("mean").expect("mean");
        assert_eq!(mean.declaration.signature(), "mean(ls: array<float>) -> float");
        assert_eq!(mean.examples, ["mean([1.0, 2.0])"]);

        let request = mean.request("default-model", &HashMap::new()).expect("request");
        assert_eq!(request.model, "default-model");
        assert_eq!(request.max_attempts, Some(3));
        assert_eq!(request.tests, ["mean([1.0, 2.0, 3.0]) == 2.0"]);
    }

    #[test]
    fn table_model_overrides_default_and_helpers_resolve() {
        let file = DeclarationFile::parse(MEAN_AND_VARIANCE).expect("parse");
        let mut helpers = helpers(&file);
        helpers.insert(
            "mean".to_string(),
            file.function("mean")
                .map(|f| HelperSource {
                    declaration: f.declaration.clone(),
                    source: "fn mean(ls) { 0.0 }".to_string(),
                })
                .expect("mean")
                .to_helper()
                .expect("helper"),
        );

        let request = file
            .function("variance")
            .expect("variance")
            .request("default-model", &helpers)
            .expect("request");

        assert_eq!(request.model, "gpt-4o-mini");
        assert!(!request.log);
        let names: Vec<_> = request.helpers.iter().map(Helper::name).collect();
        assert_eq!(names, ["square", "mean"]);
    }

    #[test]
    fn unknown_helper_is_malformed() {
        let file = DeclarationFile::parse(MEAN_AND_VARIANCE).expect("parse");
        let err = file
            .function("variance")
            .expect("variance")
            .request("m", &helpers(&file))
            .unwrap_err();
        assert!(err.to_string().contains("unknown helper \"mean\""));
    }

    #[test]
    fn synthesis_that_is_not_a_table_is_malformed() {
        let file = DeclarationFile::parse(
            r#"
[[function]]
name = "broken"
synthesis = "just a string"
"#,
        )
        .expect("parse");

        let err = file.functions[0].request("m", &HashMap::new()).unwrap_err();
        assert!(matches!(err, SynthesisError::MalformedRequest { .. }));
        assert!(err.to_string().contains("found string"));
    }

    #[test]
    fn missing_or_unknown_synthesis_keys_are_malformed() {
        let file = DeclarationFile::parse(
            r#"
[[function]]
name = "bare"

[[function]]
name = "typo"

[function.synthesis]
max_attempt = 3
"#,
        )
        .expect("parse");

        let missing = file.functions[0].request("m", &HashMap::new()).unwrap_err();
        assert!(missing.to_string().contains("no [synthesis] table"));

        let typo = file.functions[1].request("m", &HashMap::new()).unwrap_err();
        assert!(matches!(typo, SynthesisError::MalformedRequest { .. }));
        assert!(typo.to_string().contains("max_attempt"));
    }

    #[test]
    fn unknown_top_level_tables_are_rejected() {
        assert!(DeclarationFile::parse("[[functions]]\nname = \"x\"").is_err());
    }
}
