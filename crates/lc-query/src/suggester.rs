use crate::types::{OrphanDataset, SuggestedPattern};

/// Extract a normalized "table name" from a URN: the last `/`-segment, then
/// the last `.`-segment of that (spec §4.5). Schema-qualified forms like
/// `pg://warehouse/public.customers` and alias forms like
/// `demo_postgres/customers` both yield `"customers"`. An empty result
/// disqualifies the URN from table-name matching.
pub fn table_name_from_urn(urn: &str) -> String {
    let last_segment = urn.rsplit('/').next().unwrap_or(urn);
    let table = last_segment.rsplit('.').next().unwrap_or(last_segment);
    table.trim().to_string()
}

/// External pattern-suggester seam (spec §4.5): "suggested patterns are
/// offered from the orphan list by an external pattern-suggester interface;
/// the core just forwards the orphan array and returns its output."
pub trait PatternSuggester: Send + Sync {
    fn suggest(&self, orphans: &[OrphanDataset]) -> Vec<SuggestedPattern>;
}

/// A suggester with no opinions: `QueryCorrelationHealth` uses this when the
/// caller wires up no suggester at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSuggester;

impl PatternSuggester for NoopSuggester {
    fn suggest(&self, _orphans: &[OrphanDataset]) -> Vec<SuggestedPattern> {
        Vec::new()
    }
}

/// Default `PatternSuggester`: for every orphan with a table-name
/// `likely_match`, propose rewriting the orphan's own table-name segment
/// into the match's producer URN.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableNameSuggester;

impl PatternSuggester for TableNameSuggester {
    fn suggest(&self, orphans: &[OrphanDataset]) -> Vec<SuggestedPattern> {
        orphans
            .iter()
            .filter_map(|orphan| {
                let likely = orphan.likely_match.as_ref()?;
                let table_name = table_name_from_urn(&orphan.dataset_urn);
                if table_name.is_empty() {
                    return None;
                }
                Some(SuggestedPattern {
                    pattern: orphan.dataset_urn.clone(),
                    canonical: likely.urn.clone(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_table_name_from_schema_qualified_urn() {
        assert_eq!(table_name_from_urn("pg://warehouse/public.customers"), "customers");
    }

    #[test]
    fn extracts_table_name_from_alias_style_urn() {
        assert_eq!(table_name_from_urn("demo_postgres/customers"), "customers");
    }

    #[test]
    fn extracts_table_name_with_no_path_separator() {
        assert_eq!(table_name_from_urn("customers"), "customers");
    }

    #[test]
    fn trailing_slash_yields_empty_table_name() {
        assert_eq!(table_name_from_urn("pg://warehouse/"), "");
    }

    #[test]
    fn table_name_suggester_proposes_orphan_to_match_pattern() {
        let orphans = vec![OrphanDataset {
            dataset_urn: "demo_postgres/customers".to_string(),
            likely_match: Some(crate::types::LikelyMatch {
                urn: "postgresql://demo/marts.customers".to_string(),
                confidence: 1.0,
                reason: "exact_table_name".to_string(),
            }),
        }];

        let suggestions = TableNameSuggester.suggest(&orphans);
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].pattern, "demo_postgres/customers");
        assert_eq!(suggestions[0].canonical, "postgresql://demo/marts.customers");
    }

    #[test]
    fn table_name_suggester_skips_orphans_without_a_match() {
        let orphans = vec![OrphanDataset {
            dataset_urn: "unknown/thing".to_string(),
            likely_match: None,
        }];
        assert!(TableNameSuggester.suggest(&orphans).is_empty());
    }
}
