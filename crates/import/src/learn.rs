use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;
use spendmap_core::{Taxonomy, UNCATEGORIZED};
use thiserror::Error;

use crate::rules::{parse_kind, read_rule_rows, write_rule_rows, MatchType, RuleError, RuleRow};
use crate::util::{pick_first_present, read_lossy};

#[derive(Error, Debug)]
pub enum LearnError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("Mapping store error: {0}")]
    Rules(#[from] RuleError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LearnStats {
    pub added: usize,
    pub duplicate: usize,
    pub conflicting: usize,
    pub total_rules: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LearnOutcome {
    Applied(LearnStats),
    /// Nothing was learned; the mapping file was not touched.
    Skipped { reason: String },
}

impl LearnOutcome {
    fn skipped(reason: String) -> Self {
        tracing::warn!("[learn] {reason}");
        LearnOutcome::Skipped { reason }
    }
}

type RuleKey = (String, String);

/// Merges hand-labeled `(type, pattern, category)` rows from `learn_src`
/// into the mapping store at `mapping_path`.
///
/// Existing keys are never overwritten: a matching category counts as a
/// duplicate, a different one as a conflict. The store is rewritten sorted
/// by `(type, pattern)`. A missing store is created.
pub fn learn(
    mapping_path: &Path,
    learn_src: &Path,
    taxonomy: &Taxonomy,
) -> Result<LearnOutcome, LearnError> {
    if !learn_src.exists() {
        return Ok(LearnOutcome::skipped(format!(
            "No learn-from file found at: {}",
            learn_src.display()
        )));
    }

    let Some(labeled) = read_labeled(learn_src, taxonomy)? else {
        return Ok(LearnOutcome::skipped(format!(
            "'{}' must contain 'pattern' and 'category' columns.",
            learn_src.display()
        )));
    };
    if labeled.is_empty() {
        return Ok(LearnOutcome::skipped(format!(
            "No labeled rows (non-empty 'category') found in: {}",
            learn_src.display()
        )));
    }

    let mut store = read_store(mapping_path, taxonomy)?;
    let mut stats = LearnStats::default();
    for ((kind, pattern), category) in labeled {
        let key = (kind, pattern);
        match store.get(&key) {
            Some(existing) if existing.eq_ignore_ascii_case(&category) => stats.duplicate += 1,
            Some(_) => stats.conflicting += 1,
            None => {
                store.insert(key, category);
                stats.added += 1;
            }
        }
    }

    let rows: Vec<RuleRow> = store
        .into_iter()
        .map(|((kind, pattern), category)| RuleRow { kind, pattern, category })
        .collect();
    write_rule_rows(mapping_path, &rows)?;
    stats.total_rules = rows.len();

    tracing::info!(
        "[learn] Added: {}, duplicates: {}, conflicts (skipped): {}. Mapping size: {}.",
        stats.added,
        stats.duplicate,
        stats.conflicting,
        stats.total_rules
    );
    tracing::info!("[learn] Mapping updated at: {}", mapping_path.display());
    Ok(LearnOutcome::Applied(stats))
}

/// Reads the labeled rows in file order. `None` when the required columns
/// are missing. Unlabeled rows and rows with an empty pattern are dropped.
fn read_labeled(
    path: &Path,
    taxonomy: &Taxonomy,
) -> Result<Option<Vec<(RuleKey, String)>>, LearnError> {
    let text = read_lossy(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let (Some(pattern_col), Some(category_col)) = (
        pick_first_present(&headers, &["pattern"]),
        pick_first_present(&headers, &["category"]),
    ) else {
        return Ok(None);
    };
    let type_col = pick_first_present(&headers, &["type"]);

    let mut labeled = Vec::new();
    for result in reader.records() {
        let record = result?;
        let raw_kind = type_col.and_then(|i| record.get(i)).unwrap_or_default();
        let Some(kind) = parse_kind(raw_kind) else {
            tracing::warn!("[learn] Skipping row with unknown type {raw_kind:?}");
            continue;
        };
        let pattern = kind.prepare_pattern(record.get(pattern_col).unwrap_or_default());
        let category = taxonomy.canonicalize(record.get(category_col).unwrap_or_default());
        if pattern.is_empty() || category == UNCATEGORIZED {
            continue;
        }
        labeled.push(((kind.as_str().to_string(), pattern), category));
    }
    Ok(Some(labeled))
}

/// Loads and normalizes the current store, keyed by `(type, pattern)` with
/// the last occurrence of a key winning.
fn read_store(path: &Path, taxonomy: &Taxonomy) -> Result<BTreeMap<RuleKey, String>, LearnError> {
    let mut store = BTreeMap::new();
    if !path.exists() {
        tracing::info!("[learn] Creating new mapping file at {}", path.display());
        return Ok(store);
    }
    let rows = match read_rule_rows(path) {
        Ok(rows) => rows,
        Err(RuleError::MissingColumns(_)) => {
            tracing::warn!(
                "[learn] {} lacks type/pattern/category columns; starting from an empty mapping",
                path.display()
            );
            return Ok(store);
        }
        Err(e) => return Err(e.into()),
    };
    for row in rows {
        let Some(kind) = parse_kind(&row.kind) else {
            tracing::warn!("[learn] Dropping stored rule with unknown type {:?}", row.kind);
            continue;
        };
        let pattern = kind.prepare_pattern(&row.pattern);
        if pattern.is_empty() {
            continue;
        }
        store.insert(
            (kind.as_str().to_string(), pattern),
            taxonomy.canonicalize(&row.category),
        );
    }
    Ok(store)
}

/// Counts how many rules of each kind a store file holds.
pub fn summarize_store(path: &Path) -> Result<HashMap<MatchType, usize>, LearnError> {
    let mut counts = HashMap::new();
    if !path.exists() {
        return Ok(counts);
    }
    for row in read_rule_rows(path)? {
        if let Some(kind) = parse_kind(&row.kind) {
            *counts.entry(kind).or_insert(0) += 1;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn tax() -> &'static Taxonomy {
        Taxonomy::builtin()
    }

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn applied(outcome: LearnOutcome) -> LearnStats {
        match outcome {
            LearnOutcome::Applied(stats) => stats,
            other => panic!("expected Applied, got {other:?}"),
        }
    }

    #[test]
    fn creates_store_and_adds_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("mappings/CategoryMapping.csv");
        let src = write(
            dir.path(),
            "labels.csv",
            "Merchant,pattern,type,category,count\n\
             Joes Pizza,JOES PIZZA,,dining,3\n\
             Xyzzy,xyzzy llc,contains,Pet-Food,1\n",
        );
        let stats = applied(learn(&mapping, &src, tax()).unwrap());
        assert_eq!(
            stats,
            LearnStats { added: 2, duplicate: 0, conflicting: 0, total_rules: 2 }
        );
        let rows = read_rule_rows(&mapping).unwrap();
        // Sorted by (type, pattern): contains < exact.
        assert_eq!(rows[0], RuleRow::new(MatchType::Contains, "xyzzy llc", "Pet-Food"));
        assert_eq!(rows[1], RuleRow::new(MatchType::Exact, "joes pizza", "Dining"));
    }

    #[test]
    fn learning_twice_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("CategoryMapping.csv");
        let src = write(dir.path(), "l.csv", "pattern,category\njoes pizza,Dining\ncomcast,Utilities\n");
        let first = applied(learn(&mapping, &src, tax()).unwrap());
        let second = applied(learn(&mapping, &src, tax()).unwrap());
        assert_eq!(first.added, 2);
        assert_eq!(second.added, 0);
        assert_eq!(second.duplicate, 2);
        assert_eq!(first.total_rules, second.total_rules);
    }

    #[test]
    fn conflict_keeps_existing_category() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = write(
            dir.path(),
            "CategoryMapping.csv",
            "type,pattern,category\nexact,joes pizza,Dining\n",
        );
        let src = write(dir.path(), "l.csv", "pattern,category\nJOES PIZZA,Shopping\n");
        let stats = applied(learn(&mapping, &src, tax()).unwrap());
        assert_eq!(stats.conflicting, 1);
        assert_eq!(stats.added, 0);
        let rows = read_rule_rows(&mapping).unwrap();
        assert_eq!(rows, vec![RuleRow::new(MatchType::Exact, "joes pizza", "Dining")]);
    }

    #[test]
    fn duplicate_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = write(
            dir.path(),
            "CategoryMapping.csv",
            "type,pattern,category\nexact,abc,Pet-Food\n",
        );
        let src = write(dir.path(), "l.csv", "pattern,category\nabc,pet-food\n");
        assert_eq!(applied(learn(&mapping, &src, tax()).unwrap()).duplicate, 1);
    }

    #[test]
    fn first_label_in_a_batch_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("CategoryMapping.csv");
        let src = write(dir.path(), "l.csv", "pattern,category\nabc,Dining\nabc,Shopping\nabc,dining\n");
        let stats = applied(learn(&mapping, &src, tax()).unwrap());
        assert_eq!(
            stats,
            LearnStats { added: 1, duplicate: 1, conflicting: 1, total_rules: 1 }
        );
    }

    #[test]
    fn unlabeled_rows_are_not_learned() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("CategoryMapping.csv");
        let src = write(
            dir.path(),
            "l.csv",
            "pattern,category\nabc,\ndef,Uncategorized\n,Dining\n",
        );
        let outcome = learn(&mapping, &src, tax()).unwrap();
        assert!(matches!(outcome, LearnOutcome::Skipped { .. }));
        assert!(!mapping.exists());
    }

    #[test]
    fn missing_learn_file_is_soft_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("CategoryMapping.csv");
        let outcome = learn(&mapping, &dir.path().join("absent.csv"), tax()).unwrap();
        assert!(matches!(outcome, LearnOutcome::Skipped { .. }));
    }

    #[test]
    fn learn_file_without_required_columns_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("CategoryMapping.csv");
        let src = write(dir.path(), "l.csv", "Merchant,count\nAbc,2\n");
        let outcome = learn(&mapping, &src, tax()).unwrap();
        assert!(matches!(outcome, LearnOutcome::Skipped { .. }));
    }

    #[test]
    fn existing_store_is_normalized_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = write(
            dir.path(),
            "CategoryMapping.csv",
            "type,pattern,category\n\
             EXACT,ABC #12,dining\n\
             ,abc,Shopping\n\
             contains,,Dining\n",
        );
        let src = write(dir.path(), "l.csv", "pattern,category\nzzz,Travel\n");
        let stats = applied(learn(&mapping, &src, tax()).unwrap());
        // "ABC #12" and "abc" collapse to one key; the later row wins.
        assert_eq!(stats.total_rules, 2);
        let rows = read_rule_rows(&mapping).unwrap();
        assert_eq!(rows[0], RuleRow::new(MatchType::Exact, "abc", "Shopping"));
        assert_eq!(rows[1], RuleRow::new(MatchType::Exact, "zzz", "Travel"));
    }

    #[test]
    fn toml_store_round_trips_through_learning() {
        let dir = tempfile::tempdir().unwrap();
        let mapping = dir.path().join("rules.toml");
        let src = write(dir.path(), "l.csv", "type,pattern,category\nregex,^uber\\s,Transportation\n");
        applied(learn(&mapping, &src, tax()).unwrap());
        let rows = read_rule_rows(&mapping).unwrap();
        assert_eq!(rows, vec![RuleRow::new(MatchType::Regex, r"^uber\s", "Transportation")]);
        let counts = summarize_store(&mapping).unwrap();
        assert_eq!(counts.get(&MatchType::Regex), Some(&1));
    }
}
