use std::path::{Path, PathBuf};

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use spendmap_core::Taxonomy;
use thiserror::Error;

use crate::normalize::normalize;
use crate::util::{pick_first_present, read_lossy};

/// Kind of a user mapping rule. Variant order is the sort order of the
/// persisted store.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Contains,
    #[default]
    Exact,
    Regex,
}

impl MatchType {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchType::Contains => "contains",
            MatchType::Exact => "exact",
            MatchType::Regex => "regex",
        }
    }

    /// Storage form of a pattern. Exact and contains patterns are matched
    /// against normalized descriptions, so they are normalized too; regex
    /// patterns keep their metacharacters.
    pub fn prepare_pattern(self, raw: &str) -> String {
        match self {
            MatchType::Regex => raw.trim().to_string(),
            MatchType::Exact | MatchType::Contains => normalize(raw),
        }
    }
}

/// Parses a stored `type` cell. Empty means exact.
pub fn parse_kind(raw: &str) -> Option<MatchType> {
    if raw.trim().is_empty() {
        return Some(MatchType::Exact);
    }
    raw.parse().ok()
}

impl std::str::FromStr for MatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contains" => Ok(MatchType::Contains),
            "exact" => Ok(MatchType::Exact),
            "regex" => Ok(MatchType::Regex),
            other => Err(format!("Unknown match type: '{other}'")),
        }
    }
}

/// One row of the mapping file, as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RuleRow {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub pattern: String,
    #[serde(default)]
    pub category: String,
}

impl RuleRow {
    pub fn new(kind: MatchType, pattern: &str, category: &str) -> Self {
        Self {
            kind: kind.as_str().to_string(),
            pattern: pattern.to_string(),
            category: category.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRule {
    pub match_type: MatchType,
    pub pattern: String,
    pub category: String,
}

/// Internal pairing of a regex rule with its compiled form.
#[derive(Debug)]
struct CompiledRegex {
    regex: Regex,
    category: String,
}

/// The user's mapping rules, grouped by kind, each list in load order.
#[derive(Debug, Default)]
pub struct RuleSet {
    exact: Vec<CategoryRule>,
    contains: Vec<CategoryRule>,
    regex: Vec<CompiledRegex>,
}

impl RuleSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a rule set from prepared rules. Regex rules that fail to
    /// compile are skipped with a warning.
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let mut set = Self::default();
        for rule in rules {
            if rule.pattern.is_empty() {
                continue;
            }
            match rule.match_type {
                MatchType::Exact => set.exact.push(rule),
                MatchType::Contains => set.contains.push(rule),
                MatchType::Regex => {
                    match RegexBuilder::new(&rule.pattern).case_insensitive(true).build() {
                        Ok(regex) => set.regex.push(CompiledRegex {
                            regex,
                            category: rule.category,
                        }),
                        Err(e) => {
                            tracing::warn!("Skipping invalid regex rule {:?}: {e}", rule.pattern);
                        }
                    }
                }
            }
        }
        set
    }

    /// Normalizes raw rows (type, pattern, category) into rules. Rows with an
    /// unknown type or an empty pattern are dropped.
    pub fn from_rows(rows: &[RuleRow], taxonomy: &Taxonomy) -> Self {
        let rules = rows
            .iter()
            .filter_map(|row| {
                let Some(match_type) = parse_kind(&row.kind) else {
                    tracing::warn!(
                        "Skipping mapping row {:?} with unknown type {:?}",
                        row.pattern,
                        row.kind
                    );
                    return None;
                };
                let pattern = match_type.prepare_pattern(&row.pattern);
                if pattern.is_empty() {
                    return None;
                }
                Some(CategoryRule {
                    match_type,
                    pattern,
                    category: taxonomy.canonicalize(&row.category),
                })
            })
            .collect();
        Self::new(rules)
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.contains.len() + self.regex.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn find_exact(&self, text: &str) -> Option<&str> {
        self.exact
            .iter()
            .find(|r| r.pattern == text)
            .map(|r| r.category.as_str())
    }

    pub fn find_contains(&self, text: &str) -> Option<&str> {
        self.contains
            .iter()
            .find(|r| text.contains(r.pattern.as_str()))
            .map(|r| r.category.as_str())
    }

    pub fn find_regex(&self, text: &str) -> Option<&str> {
        self.regex
            .iter()
            .find(|r| r.regex.is_match(text))
            .map(|r| r.category.as_str())
    }

    /// Distinct categories referenced by the rules, in load order.
    pub fn categories(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        let all = self
            .exact
            .iter()
            .chain(self.contains.iter())
            .map(|r| r.category.as_str())
            .chain(self.regex.iter().map(|r| r.category.as_str()));
        for c in all {
            if !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlRead(#[from] toml::de::Error),
    #[error("Failed to write TOML: {0}")]
    TomlWrite(#[from] toml::ser::Error),
    #[error("Mapping file {} must have columns: type, pattern, category", .0.display())]
    MissingColumns(PathBuf),
}

/// On-disk format of a mapping file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Csv,
    Toml,
}

impl RuleFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => RuleFormat::Toml,
            _ => RuleFormat::Csv,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TomlRules {
    #[serde(default)]
    rule: Vec<RuleRow>,
}

pub const RULE_COLUMNS: [&str; 3] = ["type", "pattern", "category"];

/// Reads the raw rows of a mapping file without normalizing them.
pub fn read_rule_rows(path: &Path) -> Result<Vec<RuleRow>, RuleError> {
    let text = read_lossy(path)?;
    match RuleFormat::for_path(path) {
        RuleFormat::Toml => {
            let parsed: TomlRules = toml::from_str(&text)?;
            Ok(parsed.rule)
        }
        RuleFormat::Csv => read_csv_rule_rows(&text, path),
    }
}

fn read_csv_rule_rows(text: &str, path: &Path) -> Result<Vec<RuleRow>, RuleError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let (Some(type_col), Some(pattern_col), Some(category_col)) = (
        pick_first_present(&headers, &["type"]),
        pick_first_present(&headers, &["pattern"]),
        pick_first_present(&headers, &["category"]),
    ) else {
        return Err(RuleError::MissingColumns(path.to_path_buf()));
    };

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        rows.push(RuleRow {
            kind: record.get(type_col).unwrap_or_default().to_string(),
            pattern: record.get(pattern_col).unwrap_or_default().to_string(),
            category: record.get(category_col).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

/// Writes rows to a mapping file in the format implied by its extension,
/// creating parent directories as needed.
pub fn write_rule_rows(path: &Path, rows: &[RuleRow]) -> Result<(), RuleError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match RuleFormat::for_path(path) {
        RuleFormat::Toml => {
            let doc = TomlRules { rule: rows.to_vec() };
            std::fs::write(path, toml::to_string(&doc)?)?;
        }
        RuleFormat::Csv => {
            let mut writer = csv::Writer::from_path(path)?;
            writer.write_record(RULE_COLUMNS)?;
            for row in rows {
                writer.write_record([&row.kind, &row.pattern, &row.category])?;
            }
            writer.flush()?;
        }
    }
    Ok(())
}

/// Loads a mapping file into a [`RuleSet`]. A missing file is an empty set.
pub fn load(path: &Path, taxonomy: &Taxonomy) -> Result<RuleSet, RuleError> {
    if !path.exists() {
        tracing::debug!("No mapping file at {}", path.display());
        return Ok(RuleSet::empty());
    }
    let rows = read_rule_rows(path)?;
    let set = RuleSet::from_rows(&rows, taxonomy);
    tracing::debug!("Loaded {} mapping rules from {}", set.len(), path.display());
    Ok(set)
}
