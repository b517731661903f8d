//! Keyword-based source routing.
//!
//! Maps a question to an optional source-document filter using an ordered
//! table of keyword groups. The first group with any keyword contained in
//! the lower-cased question wins; no match means an unrestricted search.
//! This is a heuristic, not a classifier: there are no scores, and a new
//! document family needs a new rule.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const ALCON_CENTURION_MANUAL: &str = "Alcon_Centurion_Vision_System_Operator_s_Manual.pdf";
pub const KARL_STORZ_ENDOSCOPE_MANUAL: &str = "Karl_Storz_-_Endoscope.pdf";
pub const ZEISS_OPMI_PENTERO_MANUAL: &str = "Zeiss_OPMI_Pentero.pdf";

/// One keyword group and the source filename it routes to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub keywords: Vec<String>,
    pub source: String,
}

impl RoutingRule {
    pub fn new(keywords: &[&str], source: &str) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            source: source.to_string(),
        }
    }
}

/// Built-in rule table for the bundled device manuals.
pub fn builtin_rules() -> Vec<RoutingRule> {
    vec![
        RoutingRule::new(&["centurion", "alcon"], ALCON_CENTURION_MANUAL),
        RoutingRule::new(
            &["karl storz", "endoscope", "equimat"],
            KARL_STORZ_ENDOSCOPE_MANUAL,
        ),
        RoutingRule::new(&["zeiss", "opmi", "pentero"], ZEISS_OPMI_PENTERO_MANUAL),
    ]
}

/// Ordered keyword-rule table.
#[derive(Debug, Clone)]
pub struct SourceRouter {
    rules: Vec<RoutingRule>,
}

impl Default for SourceRouter {
    fn default() -> Self {
        Self::new(builtin_rules())
    }
}

impl SourceRouter {
    /// Build a router. Keywords are lower-cased; empty keywords are dropped.
    pub fn new(rules: Vec<RoutingRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|rule| RoutingRule {
                keywords: rule
                    .keywords
                    .iter()
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect(),
                source: rule.source,
            })
            .collect();
        Self { rules }
    }

    pub fn rules(&self) -> &[RoutingRule] {
        &self.rules
    }

    /// Return the source filter for a question, if any rule matches.
    pub fn detect(&self, question: &str) -> Option<&str> {
        let lower = question.to_lowercase();
        let detected = self
            .rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| lower.contains(k.as_str())))
            .map(|rule| rule.source.as_str());

        match detected {
            Some(source) => info!(
                source,
                question = %preview(question),
                "Detected source filter"
            ),
            None => debug!(question = %preview(question), "No source filter detected"),
        }
        detected
    }
}

/// First 50 characters of a question, for logs.
pub(crate) fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
