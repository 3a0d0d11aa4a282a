//! Tag predicates
//!
//! The boolean query tree evaluated against a series' tag map. Predicates
//! referencing a missing tag simply fail to match; they are never errors.

use crate::model::TagMap;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A regex predicate over one tag, anchored at the start of the value
///
/// Equality and hashing use the source pattern so queries containing a
/// regex can be compared and cached.
#[derive(Debug, Clone)]
pub struct TagRegex {
    pattern: String,
    re: Regex,
}

impl TagRegex {
    /// Compile a pattern, implicitly anchored at the start of the value
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let re = Regex::new(&format!("^(?:{})", pattern))?;
        Ok(Self {
            pattern: pattern.to_string(),
            re,
        })
    }

    /// Source pattern without the implicit anchor
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Test a tag value
    pub fn is_match(&self, value: &str) -> bool {
        self.re.is_match(value)
    }
}

impl PartialEq for TagRegex {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern
    }
}

impl Eq for TagRegex {}

impl Hash for TagRegex {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.pattern.hash(state);
    }
}

/// A boolean predicate over tag maps
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Query {
    /// Matches every series
    True,
    /// Matches nothing
    False,
    /// Tag `k` present with exactly value `v`
    Equal(String, String),
    /// Tag `k` present and matching the anchored pattern
    Regex(String, TagRegex),
    /// Tag `k` present with any value
    HasKey(String),
    /// Tag `k` present with one of the listed values
    In(String, Vec<String>),
    /// Both sides match
    And(Box<Query>, Box<Query>),
    /// Either side matches
    Or(Box<Query>, Box<Query>),
    /// Inner does not match
    Not(Box<Query>),
}

impl Query {
    /// Equality predicate
    pub fn equal(k: impl Into<String>, v: impl Into<String>) -> Query {
        Query::Equal(k.into(), v.into())
    }

    /// Conjunction
    pub fn and(self, other: Query) -> Query {
        Query::And(Box::new(self), Box::new(other))
    }

    /// Disjunction
    pub fn or(self, other: Query) -> Query {
        Query::Or(Box::new(self), Box::new(other))
    }

    /// Negation
    pub fn not(self) -> Query {
        Query::Not(Box::new(self))
    }

    /// Evaluate against a tag map
    pub fn matches(&self, tags: &TagMap) -> bool {
        match self {
            Query::True => true,
            Query::False => false,
            Query::Equal(k, v) => tags.get(k).map(|t| t == v).unwrap_or(false),
            Query::Regex(k, re) => tags.get(k).map(|t| re.is_match(t)).unwrap_or(false),
            Query::HasKey(k) => tags.contains_key(k),
            Query::In(k, vs) => tags.get(k).map(|t| vs.iter().any(|v| v == t)).unwrap_or(false),
            Query::And(a, b) => a.matches(tags) && b.matches(tags),
            Query::Or(a, b) => a.matches(tags) || b.matches(tags),
            Query::Not(q) => !q.matches(tags),
        }
    }

    /// The tag pairs this query pins exactly
    ///
    /// Used to derive tags for aggregated output series: only `Equal`
    /// predicates reachable through conjunctions contribute.
    pub fn exact_tags(&self) -> TagMap {
        let mut out = BTreeMap::new();
        self.collect_exact(&mut out);
        out
    }

    fn collect_exact(&self, out: &mut TagMap) {
        match self {
            Query::Equal(k, v) => {
                out.insert(k.clone(), v.clone());
            }
            Query::And(a, b) => {
                a.collect_exact(out);
                b.collect_exact(out);
            }
            _ => {}
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::True => write!(f, ":true"),
            Query::False => write!(f, ":false"),
            Query::Equal(k, v) => write!(f, "{}={}", k, v),
            Query::Regex(k, re) => write!(f, "{}~/{}/", k, re.pattern()),
            Query::HasKey(k) => write!(f, "has({})", k),
            Query::In(k, vs) => write!(f, "{} in ({})", k, vs.join(",")),
            Query::And(a, b) => write!(f, "{} and {}", a, b),
            Query::Or(a, b) => write!(f, "({} or {})", a, b),
            Query::Not(q) => write!(f, "not({})", q),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_equal_matches() {
        let q = Query::equal("name", "sps");
        assert!(q.matches(&tags(&[("name", "sps")])));
        assert!(!q.matches(&tags(&[("name", "cpu")])));
        // Missing tag is a non-match, not an error
        assert!(!q.matches(&tags(&[("nf.cluster", "sps")])));
    }

    #[test]
    fn test_boolean_composition() {
        let q = Query::equal("name", "sps").and(Query::equal("nf.cluster", "silverlight"));
        assert!(q.matches(&tags(&[("name", "sps"), ("nf.cluster", "silverlight")])));
        assert!(!q.matches(&tags(&[("name", "sps")])));

        let q = Query::equal("name", "sps").or(Query::equal("name", "cpu"));
        assert!(q.matches(&tags(&[("name", "cpu")])));

        let q = Query::equal("name", "sps").not();
        assert!(q.matches(&tags(&[("name", "cpu")])));
        assert!(!q.matches(&tags(&[("name", "sps")])));
    }

    #[test]
    fn test_regex_is_prefix_anchored() {
        let q = Query::Regex("name".to_string(), TagRegex::new("sps.*").unwrap());
        assert!(q.matches(&tags(&[("name", "sps_browse")])));
        assert!(!q.matches(&tags(&[("name", "xsps")])));
    }

    #[test]
    fn test_has_key_and_in() {
        let has = Query::HasKey("nf.cluster".to_string());
        assert!(has.matches(&tags(&[("nf.cluster", "a")])));
        assert!(!has.matches(&tags(&[("name", "a")])));

        let q = Query::In(
            "nf.cluster".to_string(),
            vec!["a".to_string(), "b".to_string()],
        );
        assert!(q.matches(&tags(&[("nf.cluster", "b")])));
        assert!(!q.matches(&tags(&[("nf.cluster", "c")])));
    }

    #[test]
    fn test_true_false() {
        assert!(Query::True.matches(&TagMap::new()));
        assert!(!Query::False.matches(&tags(&[("name", "sps")])));
    }

    #[test]
    fn test_exact_tags_from_conjunctions() {
        let q = Query::equal("name", "sps")
            .and(Query::equal("nf.app", "www"))
            .and(Query::HasKey("nf.cluster".to_string()));
        let exact = q.exact_tags();
        assert_eq!(exact.len(), 2);
        assert_eq!(exact.get("name").map(String::as_str), Some("sps"));

        // Disjunctions pin nothing
        let q = Query::equal("name", "sps").or(Query::equal("name", "cpu"));
        assert!(q.exact_tags().is_empty());
    }

    #[test]
    fn test_query_equality_with_regex() {
        let a = Query::Regex("name".to_string(), TagRegex::new("sps.*").unwrap());
        let b = Query::Regex("name".to_string(), TagRegex::new("sps.*").unwrap());
        assert_eq!(a, b);
    }
}
