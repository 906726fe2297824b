//! `${name}` expansion-placeholder substitution.
//!
//! A small standalone module rather than a hand-rolled scanner, since the
//! pack reaches for `regex` for this class of text-substitution problem.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").expect("static pattern is valid"));

/// Expand every `${name}` placeholder in `input` using `expansions`.
///
/// # Errors
///
/// Returns the first unresolved placeholder name if `input` references a
/// key not present in `expansions`.
pub fn expand(input: &str, expansions: &HashMap<String, String>) -> Result<String, String> {
    let mut last_end = 0;
    let mut out = String::with_capacity(input.len());
    for caps in PLACEHOLDER.captures_iter(input) {
        let whole = caps.get(0).expect("capture group 0 always matches");
        let name = &caps[1];
        out.push_str(&input[last_end..whole.start()]);
        match expansions.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(name.to_string()),
        }
        last_end = whole.end();
    }
    out.push_str(&input[last_end..]);
    Ok(out)
}

/// Expand every string in a list, collecting the first error encountered.
///
/// # Errors
///
/// Returns the first unresolved placeholder name.
pub fn expand_all(
    inputs: &[String],
    expansions: &HashMap<String, String>,
) -> Result<Vec<String>, String> {
    inputs.iter().map(|s| expand(s, expansions)).collect()
}
