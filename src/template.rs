//! `{name}` placeholder substitution for agent and task fields.
//!
//! Only identifier-shaped placeholders are variables. Other braces (JSON
//! snippets in an expected output, `{}`, `{ spaced }`) pass through as
//! literal text.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{CrewError, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z_][A-Za-z0-9_\-]*)\}").expect("placeholder pattern is valid")
});

/// Names of every placeholder in `text`, in order of appearance.
pub fn placeholders(text: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Replace every placeholder in `text` with its value from `inputs`.
///
/// Fails on the first placeholder that has no entry. Substituted values are
/// inserted verbatim and never re-scanned.
pub fn interpolate(text: &str, inputs: &HashMap<String, String>) -> Result<String> {
    if let Some(name) = placeholders(text)
        .into_iter()
        .find(|name| !inputs.contains_key(name))
    {
        return Err(CrewError::MissingVariable { name });
    }

    let resolved = PLACEHOLDER.replace_all(text, |caps: &Captures| inputs[&caps[1]].clone());
    Ok(resolved.into_owned())
}

/// [`interpolate`] for optional fields.
pub fn interpolate_opt(
    text: Option<&str>,
    inputs: &HashMap<String, String>,
) -> Result<Option<String>> {
    text.map(|t| interpolate(t, inputs)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitutes_single_placeholder() {
        let out = interpolate(
            "Research the {industry} industry",
            &inputs(&[("industry", "Robotics")]),
        )
        .unwrap();
        assert_eq!(out, "Research the Robotics industry");
    }

    #[test]
    fn substitutes_repeated_and_multiple_placeholders() {
        let out = interpolate(
            "{a} and {b}, then {a} again",
            &inputs(&[("a", "x"), ("b", "y")]),
        )
        .unwrap();
        assert_eq!(out, "x and y, then x again");
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let err = interpolate("about {topic}", &HashMap::new()).unwrap_err();
        assert!(matches!(err, CrewError::MissingVariable { ref name } if name == "topic"));
    }

    #[test]
    fn first_missing_variable_wins() {
        let err = interpolate("{a} {b} {c}", &inputs(&[("a", "1")])).unwrap_err();
        assert!(matches!(err, CrewError::MissingVariable { ref name } if name == "b"));
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let text = "plain text";
        assert_eq!(interpolate(text, &HashMap::new()).unwrap(), text);
    }

    #[test]
    fn json_braces_are_literal() {
        let text = r#"Return {"summary": "..."} for {industry}"#;
        let out = interpolate(text, &inputs(&[("industry", "Energy")])).unwrap();
        assert_eq!(out, r#"Return {"summary": "..."} for Energy"#);
    }

    #[test]
    fn empty_and_spaced_braces_are_literal() {
        assert!(placeholders("{} { name } {1abc}").is_empty());
    }

    #[test]
    fn values_are_not_rescanned() {
        let out = interpolate("{a}", &inputs(&[("a", "{b}")])).unwrap();
        assert_eq!(out, "{b}");
    }

    #[test]
    fn extra_inputs_are_ignored() {
        let out = interpolate("{a}", &inputs(&[("a", "1"), ("unused", "2")])).unwrap();
        assert_eq!(out, "1");
    }

    #[test]
    fn complete_mapping_leaves_no_placeholders() {
        let templates = [
            "{industry} researcher",
            "Analyze {industry} trends in {year} for {audience}",
            "no placeholders here",
            "{a-b}{c_d}{E}",
        ];
        let map = inputs(&[
            ("industry", "Robotics"),
            ("year", "2026"),
            ("audience", "investors"),
            ("a-b", "1"),
            ("c_d", "2"),
            ("E", "3"),
        ]);
        for t in templates {
            let resolved = interpolate(t, &map).unwrap();
            assert!(placeholders(&resolved).is_empty(), "left over in {resolved}");
        }
    }

    #[test]
    fn incomplete_mapping_always_fails() {
        let map = inputs(&[("industry", "Robotics")]);
        for t in ["{year}", "{industry} {year}", "{year} {industry}"] {
            assert!(matches!(
                interpolate(t, &map),
                Err(CrewError::MissingVariable { .. })
            ));
        }
    }

    #[test]
    fn placeholders_in_order() {
        assert_eq!(placeholders("{b} {a} {b}"), vec!["b", "a", "b"]);
    }

    #[test]
    fn interpolate_opt_passes_none_through() {
        assert_eq!(interpolate_opt(None, &HashMap::new()).unwrap(), None);
        assert_eq!(
            interpolate_opt(Some("{x}.md"), &inputs(&[("x", "out")])).unwrap(),
            Some("out.md".to_string())
        );
    }
}
