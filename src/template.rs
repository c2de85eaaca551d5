use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref PLACEHOLDER_PATTERN: Regex =
        Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("placeholder regex should compile");
}

/// Fill in the `{{name}}` placeholders of a comment template.
///
/// Placeholders with no corresponding token are replaced with nothing.
pub fn render(template: &str, tokens: &[(&str, &str)]) -> String {
    PLACEHOLDER_PATTERN
        .replace_all(template, |caps: &Captures| {
            let name = &caps[1];
            tokens
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
                .unwrap_or_default()
        })
        .into_owned()
}
