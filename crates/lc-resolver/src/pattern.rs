use lc_types::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One `{pattern, canonical}` entry from the resolver's configuration (spec
/// §4.4). Both sides are templates over `{name}` (and, in general, any
/// number of other named holes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfig {
    pub pattern: String,
    pub canonical: String,
}

/// A single compiled pattern: the `pattern` template turned into an
/// anchored regex with one named capture group per `{hole}`, plus the
/// `canonical` template used to re-assemble a match.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pattern: String,
    canonical: String,
    regex: Regex,
}

impl PatternRule {
    fn compile(pattern: &str, canonical: &str) -> Result<Self> {
        let regex = Regex::new(&template_to_regex(pattern))
            .map_err(|e| Error::lineage_store_failed(format!("invalid resolver pattern {pattern:?}: {e}")))?;
        Ok(Self {
            pattern: pattern.to_string(),
            canonical: canonical.to_string(),
            regex,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// `Some(resolved)` if `urn` matches this rule's pattern template, with
    /// captured variables substituted into the canonical template.
    fn try_resolve(&self, urn: &str) -> Option<String> {
        let caps = self.regex.captures(urn)?;
        Some(substitute_template(&self.canonical, |name| {
            caps.name(name).map(|m| m.as_str().to_string())
        }))
    }
}

/// Turn a `{hole}` template into an anchored regex with one named capture
/// group per hole; literal characters are escaped. Holes match anything but
/// `/` so that a multi-segment URN still binds one hole per path segment.
fn template_to_regex(template: &str) -> String {
    let mut out = String::from("^");
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    break;
                }
                name.push(c2);
            }
            out.push_str(&format!("(?P<{name}>[^/]+)"));
        } else {
            out.push_str(&regex::escape(&c.to_string()));
        }
    }
    out.push('$');
    out
}

/// Render a `{hole}` template, resolving each hole via `lookup`. A hole with
/// no binding is left in place (`{hole}`) rather than silently dropped.
fn substitute_template(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '{' {
            let mut name = String::new();
            for c2 in chars.by_ref() {
                if c2 == '}' {
                    break;
                }
                name.push(c2);
            }
            match lookup(&name) {
                Some(value) => out.push_str(&value),
                None => {
                    out.push('{');
                    out.push_str(&name);
                    out.push('}');
                }
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Pattern-based URN rewriter (spec §4.4). Patterns compile once at
/// construction; `resolve` is deterministic and ordering-stable — the first
/// pattern whose template matches (in config order) wins.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    rules: Vec<PatternRule>,
}

impl AliasResolver {
    pub fn new(patterns: &[PatternConfig]) -> Result<Self> {
        let rules = patterns
            .iter()
            .map(|p| PatternRule::compile(&p.pattern, &p.canonical))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// No patterns configured: `resolve` always returns its input unchanged.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Resolve `urn` to its canonical form. Input returned unchanged if no
    /// pattern matches (spec §4.4).
    pub fn resolve(&self, urn: &str) -> String {
        for rule in &self.rules {
            if let Some(resolved) = rule.try_resolve(urn) {
                return resolved;
            }
        }
        urn.to_string()
    }

    /// Number of configured patterns — callers (C7) use this to decide
    /// between the plain view-path and the resolver-aware two-phase path.
    pub fn get_pattern_count(&self) -> usize {
        self.rules.len()
    }

    pub fn patterns(&self) -> &[PatternRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver_tc_002() -> AliasResolver {
        AliasResolver::new(&[PatternConfig {
            pattern: "demo_postgres/{n}".to_string(),
            canonical: "postgresql://demo/marts.{n}".to_string(),
        }])
        .unwrap()
    }

    #[test]
    fn resolves_matching_pattern() {
        let resolver = resolver_tc_002();
        assert_eq!(
            resolver.resolve("demo_postgres/customers"),
            "postgresql://demo/marts.customers"
        );
    }

    #[test]
    fn unmatched_urn_returned_unchanged() {
        let resolver = resolver_tc_002();
        assert_eq!(resolver.resolve("pg://other/table"), "pg://other/table");
    }

    #[test]
    fn first_matching_pattern_wins_in_config_order() {
        let resolver = AliasResolver::new(&[
            PatternConfig {
                pattern: "demo/{n}".to_string(),
                canonical: "first://{n}".to_string(),
            },
            PatternConfig {
                pattern: "demo/{n}".to_string(),
                canonical: "second://{n}".to_string(),
            },
        ])
        .unwrap();
        assert_eq!(resolver.resolve("demo/x"), "first://x");
    }

    #[test]
    fn empty_resolver_has_zero_patterns_and_is_identity() {
        let resolver = AliasResolver::empty();
        assert_eq!(resolver.get_pattern_count(), 0);
        assert_eq!(resolver.resolve("anything"), "anything");
    }

    #[test]
    fn pattern_count_matches_configured_rules() {
        let resolver = resolver_tc_002();
        assert_eq!(resolver.get_pattern_count(), 1);
    }
}
