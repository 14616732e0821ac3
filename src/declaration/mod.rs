mod file;

pub use file::{DeclarationFile, DeclaredFunction, HelperSource};

use serde::{Deserialize, Serialize};

/// A function declared for synthesis: its name, parameter list, return type and doc.
///
/// The declaration is the whole contract the agent is asked to satisfy. Type
/// annotations are rendered into the prompt but are not enforced, since the
/// generated unit is untyped. Defaults become overloads of the entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionDeclaration {
    /// Name of the entry point the agent must define
    pub name: String,
    /// Declared parameters, in order
    #[serde(default)]
    pub params: Vec<Param>,
    /// Return type annotation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<String>,
    /// Natural-language description of the behavior
    #[serde(default)]
    pub doc: String,
}

/// A declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub ty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

/// The stable `(name, signature, doc)` triple derived from a declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionMetadata {
    pub name: String,
    pub signature: String,
    pub doc: String,
}

impl FunctionDeclaration {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: None,
            doc: String::new(),
        }
    }

    /// Add a typed parameter
    pub fn param(mut self, name: impl Into<String>, ty: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: Some(ty.into()),
            default: None,
        });
        self
    }

    /// Add a parameter without a type annotation
    pub fn untyped_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: None,
            default: None,
        });
        self
    }

    /// Add a typed parameter with a default value, rendered as source text
    pub fn param_with_default(
        mut self,
        name: impl Into<String>,
        ty: impl Into<String>,
        default: impl Into<String>,
    ) -> Self {
        self.params.push(Param {
            name: name.into(),
            ty: Some(ty.into()),
            default: Some(default.into()),
        });
        self
    }

    pub fn returns(mut self, ty: impl Into<String>) -> Self {
        self.returns = Some(ty.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = doc.into();
        self
    }

    /// Render the function header: name, parameter list and return annotation.
    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(Param::render)
            .collect::<Vec<_>>()
            .join(", ");

        match &self.returns {
            Some(returns) => format!("{}({}) -> {}", self.name, params, returns),
            None => format!("{}({})", self.name, params),
        }
    }

    pub fn metadata(&self) -> FunctionMetadata {
        FunctionMetadata {
            name: self.name.clone(),
            signature: self.signature(),
            doc: normalize_doc(&self.doc),
        }
    }
}

impl Param {
    fn render(&self) -> String {
        let mut out = self.name.clone();
        if let Some(ty) = &self.ty {
            out.push_str(": ");
            out.push_str(ty);
        }
        if let Some(default) = &self.default {
            out.push_str(" = ");
            out.push_str(default);
        }
        out
    }
}

/// Normalize a doc string.
///
/// Leading and trailing blank lines are dropped, and the indentation of the
/// first non-blank line is stripped from every line that follows it.
pub fn normalize_doc(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();

    let Some(start) = lines.iter().position(|line| !is_blank(line)) else {
        return String::new();
    };
    let end = lines
        .iter()
        .rposition(|line| !is_blank(line))
        .unwrap_or(start);
    let indent = indent_width(lines[start]);

    lines[start..=end]
        .iter()
        .map(|line| strip_indent(line, indent))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

fn indent_width(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

// Lines indented less than `indent` only lose their own whitespace.
fn strip_indent(line: &str, indent: usize) -> &str {
    let cut = line
        .char_indices()
        .take_while(|(_, c)| c.is_whitespace())
        .take(indent)
        .last()
        .map_or(0, |(i, c)| i + c.len_utf8());
    &line[cut..]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_search() -> FunctionDeclaration {
        FunctionDeclaration::new("binary_search")
            .param("ls", "array<int>")
            .param("el", "int")
            .returns("int?")
            .doc(
                "\n    Finds the index of el in the sorted array ls.\n\n    Returns () when absent.\n    ",
            )
    }

    #[test]
    fn signature_renders_types_defaults_and_return() {
        let decl = FunctionDeclaration::new("scale")
            .param("x", "float")
            .param_with_default("k", "float", "2.0")
            .untyped_param("rest");
        assert_eq!(decl.signature(), "scale(x: float, k: float = 2.0, rest)");

        assert_eq!(
            binary_search().signature(),
            "binary_search(ls: array<int>, el: int) -> int?"
        );
        assert_eq!(
            FunctionDeclaration::new("hello_world").signature(),
            "hello_world()"
        );
    }

    #[test]
    fn metadata_is_idempotent() {
        let decl = binary_search();
        let first = decl.metadata();
        let second = decl.metadata();
        assert_eq!(first, second);
        assert_eq!(first.name, "binary_search");
        assert_eq!(
            first.doc,
            "Finds the index of el in the sorted array ls.\n\nReturns () when absent."
        );
    }

    #[test]
    fn normalize_strips_uniform_indent_for_any_width() {
        for k in [0usize, 1, 2, 4, 8] {
            let pad = " ".repeat(k);
            let text = format!("\n\n{pad}first line\n{pad}  nested\n\n{pad}last\n  \n");
            assert_eq!(
                normalize_doc(&text),
                "first line\n  nested\n\nlast",
                "indent {k}"
            );
        }
    }

    #[test]
    fn normalize_handles_empty_and_blank_docs() {
        assert_eq!(normalize_doc(""), "");
        assert_eq!(normalize_doc("   \n\t\n"), "");
        assert_eq!(FunctionDeclaration::new("f").metadata().doc, "");
    }

    #[test]
    fn normalize_keeps_content_of_shallower_lines() {
        let text = "    deep\n  shallow\nnone";
        assert_eq!(normalize_doc(text), "deep\nshallow\nnone");
    }
}
