//! `${{ name }}` placeholder substitution for email bodies and landing pages

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}").expect("placeholder pattern is valid")
});

/// Substitute every known placeholder in one pass. Unknown names are left
/// verbatim so a later pass with more variables can still fill them.
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Names of every placeholder in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(template)
        .map(|caps| caps[1].to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_with_and_without_inner_whitespace() {
        let out = render(
            "Hi ${{first_name}}, see ${{ redirect }}",
            &vars(&[("first_name", "Bob"), ("redirect", "https://x/click")]),
        );
        assert_eq!(out, "Hi Bob, see https://x/click");
    }

    #[test]
    fn test_unknown_placeholders_are_left_verbatim() {
        let out = render("${{ missing }} and ${{known}}", &vars(&[("known", "k")]));
        assert_eq!(out, "${{ missing }} and k");
    }

    #[test]
    fn test_substitution_is_literal() {
        let out = render("${{ a }}", &vars(&[("a", "$1 ${b}")]));
        assert_eq!(out, "$1 ${b}");
    }

    #[test]
    fn test_render_is_idempotent() {
        let m = vars(&[("pixel", "<img src=\"x\">"), ("name", "Ann")]);
        let s = "Dear ${{name}} ${{ pixel }} ${{ other }}";
        let once = render(s, &m);
        assert_eq!(render(&once, &m), once);
    }

    #[test]
    fn test_placeholders_lists_names() {
        assert_eq!(
            placeholders("${{a}} x ${{ b.c }}"),
            vec!["a".to_string(), "b.c".to_string()]
        );
    }
}
