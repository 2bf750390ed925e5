//! Finds placeholder tokens in text without interpreting them.

use std::ops::Range;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::errors::FilterError;

/// `{USER_EMAIL}`: one capture, the body.
static SIMPLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([A-Za-z0-9_]+?)\}").expect("simple token pattern compiles")
});

/// `{{metadata::course=234::credits}}`: context (with optional instance), field.
static NAMESPACED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{metadata::([A-Za-z_]+(?:=[0-9]+)?)::([A-Za-z0-9_]+)\}\}")
        .expect("namespaced token pattern compiles")
});

/// Which token syntax a pass recognizes. The two are never mixed in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grammar {
    #[default]
    Simple,
    Namespaced,
}

impl Grammar {
    fn pattern(self) -> &'static Regex {
        match self {
            Grammar::Simple => &*SIMPLE,
            Grammar::Namespaced => &*NAMESPACED,
        }
    }
}

impl FromStr for Grammar {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Grammar::Simple),
            "namespaced" | "metadata" => Ok(Grammar::Namespaced),
            other => Err(FilterError::Config(format!("unknown grammar `{other}`"))),
        }
    }
}

/// One match: the full span and its capture groups, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMatch<'t> {
    pub span: Range<usize>,
    pub text: &'t str,
    pub groups: Vec<&'t str>,
}

/// Lazily yields non-overlapping matches, left to right.
pub fn scan(grammar: Grammar, text: &str) -> impl Iterator<Item = RawMatch<'_>> {
    grammar.pattern().captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let groups = caps.iter().skip(1).flatten().map(|m| m.as_str()).collect();
        Some(RawMatch { span: whole.range(), text: whole.as_str(), groups })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn bodies(grammar: Grammar, text: &str) -> Vec<Vec<&str>> {
        scan(grammar, text).map(|m| m.groups).collect()
    }

    #[test]
    fn simple_tokens_in_order() {
        let text = "Hi {USER_FIRSTNAME}, see {COURSE_FULLNAME}.";
        let found: Vec<_> = scan(Grammar::Simple, text).collect();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text, "{USER_FIRSTNAME}");
        assert_eq!(found[0].span, 3..19);
        assert_eq!(found[1].groups, vec!["COURSE_FULLNAME"]);
    }

    #[test]
    fn malformed_brackets_do_not_match() {
        assert!(bodies(Grammar::Simple, "{} { USER } {USER-EMAIL} {USER_EMAIL").is_empty());
    }

    #[test]
    fn shortest_body_wins() {
        assert_eq!(bodies(Grammar::Simple, "{{USER_EMAIL}}"), vec![vec!["USER_EMAIL"]]);
        assert_eq!(bodies(Grammar::Simple, "{A}{B}"), vec![vec!["A"], vec!["B"]]);
    }

    #[test]
    fn namespaced_tokens() {
        assert_eq!(
            bodies(Grammar::Namespaced, "{{metadata::course::credits}} and {{metadata::course=234::level_2}}"),
            vec![vec!["course", "credits"], vec!["course=234", "level_2"]]
        );
    }

    #[test]
    fn namespaced_rejects_bad_forms() {
        let text = "{{metadata::course=::x}} {{metadata::c0urse::x}} {{meta::course::x}} {USER_EMAIL}";
        assert!(bodies(Grammar::Namespaced, text).is_empty());
    }

    #[test]
    fn grammar_from_str() {
        assert_eq!("Simple".parse::<Grammar>().unwrap(), Grammar::Simple);
        assert_eq!("metadata".parse::<Grammar>().unwrap(), Grammar::Namespaced);
        assert!("jinja".parse::<Grammar>().is_err());
    }
}
