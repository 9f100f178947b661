//! Bookmark rules evaluated against page text.

mod expr;
pub mod sample_id;

pub use expr::{Expr, evaluate};

use crate::error::Result;
use crate::model::BookmarkRule;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    Expression(Expr),
    SampleId,
}

/// A bookmark rule ready to be applied to many pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledRule {
    title: String,
    matcher: Matcher,
}

impl CompiledRule {
    pub fn compile(rule: &BookmarkRule) -> Result<Self> {
        let matcher = if rule.rule.trim() == sample_id::SAMPLE_ID_RULE {
            Matcher::SampleId
        } else {
            Matcher::Expression(Expr::parse(&rule.rule)?)
        };
        Ok(Self {
            title: rule.title.clone(),
            matcher,
        })
    }

    pub fn compile_all<'a>(rules: impl IntoIterator<Item = &'a BookmarkRule>) -> Result<Vec<Self>> {
        rules.into_iter().map(Self::compile).collect()
    }

    /// The bookmark title this rule assigns to a page, if it matches.
    pub fn title_for(&self, page_text: &str) -> Option<String> {
        match &self.matcher {
            Matcher::SampleId => sample_id::extract(page_text),
            Matcher::Expression(expr) => expr.matches(page_text).then(|| self.title.clone()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rule(title: &str, text: &str) -> BookmarkRule {
        BookmarkRule {
            title: title.to_string(),
            rule: text.to_string(),
        }
    }

    #[test]
    fn test_expression_rule_uses_configured_title() {
        let compiled = CompiledRule::compile(&rule("Calibration", "'ICAL' or 'Initial Calibration'")).unwrap();
        assert_eq!(compiled.title_for("Initial Calibration Report").as_deref(), Some("Calibration"));
        assert_eq!(compiled.title_for("Continuing check"), None);
    }

    #[test]
    fn test_sample_id_rule_titles_with_identifier() {
        let compiled = CompiledRule::compile(&rule("SAMPLEID", " SAMPLEID ")).unwrap();
        assert_eq!(compiled.title_for("Data File 5831301").as_deref(), Some("S58313.01"));
        assert_eq!(compiled.title_for("S58313.01 S58313.02"), None);
    }
}
