use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```[^\n`]*\n(.*?)```").expect("valid fence regex"));

/// Extract the code from an agent response.
///
/// Takes the last fenced block, e.g.
/// ````text
/// Here you go:
/// ```rhai
/// fn mean(ls) { ... }
/// ```
/// ````
/// and falls back to the whole trimmed response when there is no fence.
pub fn extract_code(text: &str) -> String {
    FENCED_BLOCK
        .captures_iter(text)
        .last()
        .and_then(|captures| captures.get(1))
        .map(|block| block.as_str().trim_end().to_string())
        .unwrap_or_else(|| text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_block() {
        let text = "Sure.\n\n```rhai\nfn one() { 1 }\n```\nThat's it.";
        assert_eq!(extract_code(text), "fn one() { 1 }");
    }

    #[test]
    fn last_block_wins() {
        let text = "```\nfn draft() {}\n```\nActually:\n```rhai\nfn final_one() {}\n```";
        assert_eq!(extract_code(text), "fn final_one() {}");
    }

    #[test]
    fn bare_code_is_used_as_is() {
        assert_eq!(extract_code("\n  fn two() { 2 }\n"), "fn two() { 2 }");
    }
}
