use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use spendmap_core::{Taxonomy, TransactionRow, UNCATEGORIZED};

use crate::normalize::normalize;
use crate::rules::RuleSet;

/// Which cascade step produced a row's category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    MappingExact,
    MappingContains,
    MappingRegex,
    KeywordRule,
    AliasRule,
    AliasRaw,
    Uncategorized,
}

impl MatchStage {
    /// Cascade order.
    pub const ALL: [MatchStage; 7] = [
        MatchStage::MappingExact,
        MatchStage::MappingContains,
        MatchStage::MappingRegex,
        MatchStage::KeywordRule,
        MatchStage::AliasRule,
        MatchStage::AliasRaw,
        MatchStage::Uncategorized,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MatchStage::MappingExact => "mapping_exact",
            MatchStage::MappingContains => "mapping_contains",
            MatchStage::MappingRegex => "mapping_regex",
            MatchStage::KeywordRule => "keyword_rule",
            MatchStage::AliasRule => "alias_rule",
            MatchStage::AliasRaw => "alias_raw",
            MatchStage::Uncategorized => "uncategorized",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for MatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub category: String,
    pub stage: MatchStage,
}

/// Per-run count of rows matched at each stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProvenanceCounter {
    counts: [usize; MatchStage::ALL.len()],
}

impl ProvenanceCounter {
    pub fn record(&mut self, stage: MatchStage) {
        self.counts[stage.index()] += 1;
    }

    pub fn get(&self, stage: MatchStage) -> usize {
        self.counts[stage.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Adds another counter's totals into this one.
    pub fn merge(&mut self, other: &ProvenanceCounter) {
        for (a, b) in self.counts.iter_mut().zip(other.counts.iter()) {
            *a += b;
        }
    }

    /// `(stage, count)` in cascade order, including zero counts.
    pub fn iter(&self) -> impl Iterator<Item = (MatchStage, usize)> + '_ {
        MatchStage::ALL.iter().map(move |s| (*s, self.get(*s)))
    }
}

/// Serialized as a `{stage: count}` map in cascade order.
impl Serialize for ProvenanceCounter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (stage, count) in self.iter() {
            map.serialize_entry(stage.as_str(), &count)?;
        }
        map.end()
    }
}

/// Assigns one category per transaction from the user's rules, the built-in
/// keyword rules and the alias table, in that order.
///
/// Built once per run; holds no mutable state so `resolve` is pure.
pub struct CategoryResolver {
    rules: RuleSet,
    taxonomy: Taxonomy,
}

impl CategoryResolver {
    pub fn new(rules: RuleSet, taxonomy: &Taxonomy) -> Self {
        Self { rules, taxonomy: *taxonomy }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Resolves a normalized description plus the bank's raw category text.
    ///
    /// Never fails: the last stage is always `Uncategorized`.
    pub fn resolve(&self, normalized_description: &str, raw_category: &str) -> Resolution {
        let desc = normalized_description;

        let mapped = self
            .rules
            .find_exact(desc)
            .map(|c| (c, MatchStage::MappingExact))
            .or_else(|| {
                self.rules
                    .find_contains(desc)
                    .map(|c| (c, MatchStage::MappingContains))
            })
            .or_else(|| {
                self.rules
                    .find_regex(desc)
                    .map(|c| (c, MatchStage::MappingRegex))
            });
        if let Some((category, stage)) = mapped {
            return self.resolved(category, stage);
        }

        let raw = normalize(raw_category);
        let haystack = format!("{desc} {raw}");
        let haystack = haystack.trim();

        if let Some(category) = self.taxonomy.match_keywords(haystack) {
            return self.resolved(category, MatchStage::KeywordRule);
        }
        if let Some(category) = self.taxonomy.scan_aliases(haystack) {
            return self.resolved(category, MatchStage::AliasRule);
        }
        if let Some(category) = self.taxonomy.alias(&raw) {
            return self.resolved(category, MatchStage::AliasRaw);
        }

        Resolution {
            category: UNCATEGORIZED.to_string(),
            stage: MatchStage::Uncategorized,
        }
    }

    fn resolved(&self, category: &str, stage: MatchStage) -> Resolution {
        Resolution {
            category: self.taxonomy.canonicalize(category),
            stage,
        }
    }

    /// Resolves every row in place from its clean description and raw
    /// category, returning the per-stage counts.
    pub fn categorize_rows(&self, rows: &mut [TransactionRow]) -> ProvenanceCounter {
        let mut counter = ProvenanceCounter::default();
        for row in rows.iter_mut() {
            let resolution = self.resolve(&row.clean_description, &row.category_raw);
            counter.record(resolution.stage);
            row.category = resolution.category;
        }
        counter
    }
}
