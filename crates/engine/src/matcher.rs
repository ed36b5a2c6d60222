//! Rule matching seam
//!
//! The production rule engine (regex families, scored heuristics) is an
//! external collaborator. This crate ships a minimal host/keyword matcher
//! sufficient to drive the pipeline end-to-end and to exercise the
//! matcher seam in tests.

use std::collections::HashSet;

use url::Url;

/// One match produced by a [`RuleMatcher`] against a candidate string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub rule_id: String,
    pub candidate: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Low,
    High,
}

pub trait RuleMatcher: Send + Sync {
    fn all_matches_for_candidates(&self, candidates: &[String]) -> Vec<MatchResult>;
}

/// Matches candidate strings against a denylisted-host set and a
/// denylisted-keyword substring list (case-insensitive).
pub struct KeywordHostMatcher {
    denylisted_hosts: HashSet<String>,
    denylisted_keywords: Vec<String>,
}

impl KeywordHostMatcher {
    pub fn new(denylisted_hosts: HashSet<String>, denylisted_keywords: Vec<String>) -> Self {
        Self {
            denylisted_hosts,
            denylisted_keywords: denylisted_keywords
                .into_iter()
                .map(|k| k.to_lowercase())
                .collect(),
        }
    }
}

impl RuleMatcher for KeywordHostMatcher {
    fn all_matches_for_candidates(&self, candidates: &[String]) -> Vec<MatchResult> {
        let mut matches = Vec::new();

        for candidate in candidates {
            if let Ok(url) = Url::parse(candidate) {
                if let Some(host) = url.host_str() {
                    if self.denylisted_hosts.contains(host) {
                        matches.push(MatchResult {
                            rule_id: format!("denylisted-host:{host}"),
                            candidate: candidate.clone(),
                            severity: Severity::High,
                        });
                    }
                }
            }

            let lower = candidate.to_lowercase();
            for keyword in &self.denylisted_keywords {
                if lower.contains(keyword.as_str()) {
                    matches.push(MatchResult {
                        rule_id: format!("denylisted-keyword:{keyword}"),
                        candidate: candidate.clone(),
                        severity: Severity::Low,
                    });
                }
            }
        }

        matches
    }
}
