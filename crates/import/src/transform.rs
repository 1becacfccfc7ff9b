use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use spendmap_core::{AccountId, Taxonomy, TransactionRow};
use thiserror::Error;

use crate::columnar::{self, ColumnarError};
use crate::csv::{read_source, SourceError, SourceTable};
use crate::learn::{learn, LearnError, LearnOutcome};
use crate::merchant::{MerchantResolver, MerchantTables};
use crate::normalize::normalize;
use crate::resolver::{CategoryResolver, ProvenanceCounter};
use crate::rules::{self, RuleError, RuleSet};

pub const MAPPING_FILE_NAME: &str = "CategoryMapping.csv";
pub const TOP_MERCHANTS: usize = 10;

const LEADING_COLUMNS: [&str; 6] = ["Account", "AccountSeq", "Date", "Amount", "Category", "Merchant"];
const BALANCE_COLUMN: &str = "Running Balance (num)";
const CLEAN_DESCRIPTION_COLUMN: &str = "Description (clean)";
const RAW_CATEGORY_COLUMN: &str = "Category (raw)";
const UNCATEGORIZED_COLUMNS: [&str; 5] = ["Merchant", "pattern", "type", "category", "count"];

#[derive(Error, Debug)]
pub enum TransformError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Rules(#[from] RuleError),
    #[error(transparent)]
    Learn(#[from] LearnError),
    #[error(transparent)]
    Columnar(#[from] ColumnarError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

#[derive(Debug, Clone, Default)]
pub struct TransformOptions {
    /// Explicit mapping file; discovered next to the source when `None`.
    pub category_mapping: Option<PathBuf>,
    /// Merge labeled rows into the mapping store before resolving.
    pub learn: bool,
    /// Labeled rows to learn from; defaults to the source's uncategorized file.
    pub learn_from: Option<PathBuf>,
    pub account_id: AccountId,
    pub write_parquet: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MerchantCount {
    pub merchant: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransformSummary {
    pub rows: usize,
    pub stages: ProvenanceCounter,
    pub top_merchants: Vec<MerchantCount>,
    pub uncategorized_patterns: usize,
    pub transformed_path: PathBuf,
    pub uncategorized_path: Option<PathBuf>,
    pub parquet_path: Option<PathBuf>,
    pub mapping_path: Option<PathBuf>,
    pub mapping_rules: usize,
    /// Rule categories outside the canonical taxonomy.
    pub custom_categories: Vec<String>,
    pub learn: Option<LearnOutcome>,
}

/// One distinct `(merchant, pattern)` pair among uncategorized rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncategorizedPattern {
    pub merchant: String,
    pub pattern: String,
    pub count: usize,
}

fn sibling_with_suffix(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    source.with_file_name(format!("{stem}_{suffix}.csv"))
}

pub fn transformed_path_for(source: &Path) -> PathBuf {
    sibling_with_suffix(source, "transformed")
}

pub fn uncategorized_path_for(source: &Path) -> PathBuf {
    sibling_with_suffix(source, "uncategorized")
}

fn source_dir(source: &Path) -> &Path {
    match source.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    }
}

/// First existing of `<dir>/CategoryMapping.csv` and
/// `<dir>/../mappings/CategoryMapping.csv`.
pub fn discover_mapping(source: &Path) -> Option<PathBuf> {
    let dir = source_dir(source);
    let candidates = [
        dir.join(MAPPING_FILE_NAME),
        dir.join("..").join("mappings").join(MAPPING_FILE_NAME),
    ];
    let found = candidates.into_iter().find(|p| p.is_file());
    if let Some(path) = &found {
        tracing::debug!("Discovered mapping file {}", path.display());
    }
    found
}

/// Runs normalization, merchant and category resolution over one source file
/// and writes the derived outputs beside it.
pub struct Pipeline {
    taxonomy: &'static Taxonomy,
    merchants: MerchantResolver,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Taxonomy::builtin(), MerchantTables::builtin())
    }
}

impl Pipeline {
    pub fn new(taxonomy: &'static Taxonomy, merchants: &'static MerchantTables) -> Self {
        Self {
            taxonomy,
            merchants: MerchantResolver::new(merchants),
        }
    }

    pub fn run(
        &self,
        source: &Path,
        options: &TransformOptions,
    ) -> Result<TransformSummary, TransformError> {
        let SourceTable { headers, columns, mut rows } = read_source(source)?;

        let mut mapping_path = options
            .category_mapping
            .clone()
            .or_else(|| discover_mapping(source));

        let learn_outcome = if options.learn {
            let target = mapping_path
                .clone()
                .unwrap_or_else(|| source_dir(source).join(MAPPING_FILE_NAME));
            let learn_src = options
                .learn_from
                .clone()
                .unwrap_or_else(|| uncategorized_path_for(source));
            let outcome = learn(&target, &learn_src, self.taxonomy)?;
            if matches!(outcome, LearnOutcome::Applied(_)) {
                mapping_path = Some(target);
            }
            Some(outcome)
        } else {
            None
        };

        let rule_set = match &mapping_path {
            Some(path) => rules::load(path, self.taxonomy)?,
            None => RuleSet::empty(),
        };
        tracing::debug!("Loaded {} mapping rules", rule_set.len());
        let resolver = CategoryResolver::new(rule_set, self.taxonomy);
        let custom_categories: Vec<String> = resolver
            .rules()
            .categories()
            .into_iter()
            .filter(|c| !self.taxonomy.is_canonical(c))
            .map(str::to_string)
            .collect();

        for row in rows.iter_mut() {
            row.clean_description = normalize(&row.raw_description);
            row.merchant = self.merchants.resolve(&row.clean_description);
        }
        let stages = resolver.categorize_rows(&mut rows);

        let transformed_path = transformed_path_for(source);
        write_transformed(
            &transformed_path,
            &headers,
            columns.balance.is_some(),
            &rows,
            &options.account_id,
        )?;
        tracing::info!("Wrote {} rows to {}", rows.len(), transformed_path.display());

        let patterns = uncategorized_patterns(&rows);
        let uncategorized_path = if patterns.is_empty() {
            None
        } else {
            let path = uncategorized_path_for(source);
            write_uncategorized(&path, &patterns)?;
            tracing::info!(
                "Wrote {} uncategorized patterns to {}",
                patterns.len(),
                path.display()
            );
            Some(path)
        };

        let parquet_path = if options.write_parquet {
            let path = columnar::parquet_path_for(&transformed_path);
            columnar::write_parquet(&transformed_path, &path)?;
            Some(path)
        } else {
            None
        };

        Ok(TransformSummary {
            rows: rows.len(),
            stages,
            top_merchants: top_merchants(&rows, TOP_MERCHANTS),
            uncategorized_patterns: patterns.len(),
            transformed_path,
            uncategorized_path,
            parquet_path,
            mapping_path,
            mapping_rules: resolver.rules().len(),
            custom_categories,
            learn: learn_outcome,
        })
    }
}

/// Transforms `source` with the built-in tables.
pub fn transform(
    source: &Path,
    options: &TransformOptions,
) -> Result<TransformSummary, TransformError> {
    Pipeline::default().run(source, options)
}

/// Counts keyed values, returned by descending count with ties in first
/// occurrence order.
fn count_ordered<K, I>(keys: I) -> Vec<(K, usize)>
where
    K: Clone + Eq + std::hash::Hash,
    I: IntoIterator<Item = K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut counts: Vec<(K, usize)> = Vec::new();
    for key in keys {
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }
    // Stable sort keeps first occurrence order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn top_merchants(rows: &[TransactionRow], limit: usize) -> Vec<MerchantCount> {
    count_ordered(
        rows.iter()
            .map(|r| r.merchant.as_str())
            .filter(|m| !m.is_empty()),
    )
    .into_iter()
    .take(limit)
    .map(|(merchant, count)| MerchantCount {
        merchant: merchant.to_string(),
        count,
    })
    .collect()
}

pub fn uncategorized_patterns(rows: &[TransactionRow]) -> Vec<UncategorizedPattern> {
    count_ordered(
        rows.iter()
            .filter(|r| r.is_uncategorized())
            .map(|r| (r.merchant.as_str(), r.clean_description.as_str())),
    )
    .into_iter()
    .map(|((merchant, pattern), count)| UncategorizedPattern {
        merchant: merchant.to_string(),
        pattern: pattern.to_string(),
        count,
    })
    .collect()
}

fn is_replaced_column(name: &str) -> bool {
    LEADING_COLUMNS.iter().any(|c| *c == name)
        || name == BALANCE_COLUMN
        || name == CLEAN_DESCRIPTION_COLUMN
        || name == RAW_CATEGORY_COLUMN
}

fn write_transformed(
    path: &Path,
    source_headers: &[String],
    has_balance: bool,
    rows: &[TransactionRow],
    account: &AccountId,
) -> Result<(), TransformError> {
    let kept: Vec<usize> = source_headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !is_replaced_column(h))
        .map(|(i, _)| i)
        .collect();

    let mut header: Vec<&str> = LEADING_COLUMNS.to_vec();
    header.extend(kept.iter().map(|&i| source_headers[i].as_str()));
    if has_balance {
        header.push(BALANCE_COLUMN);
    }
    header.push(CLEAN_DESCRIPTION_COLUMN);
    header.push(RAW_CATEGORY_COLUMN);

    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(&header)?;
    for (i, row) in rows.iter().enumerate() {
        let mut record: Vec<String> = vec![
            account.to_string(),
            account.seq(i + 1),
            row.date_cell(),
            row.amount_cell(),
            row.category.clone(),
            row.merchant.clone(),
        ];
        record.extend(
            kept.iter()
                .map(|&c| row.source.get(c).cloned().unwrap_or_default()),
        );
        if has_balance {
            record.push(row.balance_cell());
        }
        record.push(row.clean_description.clone());
        record.push(row.category_raw.clone());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

fn write_uncategorized(path: &Path, patterns: &[UncategorizedPattern]) -> Result<(), TransformError> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(UNCATEGORIZED_COLUMNS)?;
    for p in patterns {
        let count = p.count.to_string();
        wtr.write_record([p.merchant.as_str(), p.pattern.as_str(), "", "", count.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}
