//! Bank-export categorization: read a bank CSV, normalize descriptions,
//! resolve merchants and categories, and write the annotated table.

#[macro_use]
pub(crate) mod util;

pub mod columnar;
pub mod csv;
pub mod learn;
pub mod merchant;
pub mod normalize;
pub mod resolver;
pub mod rules;
pub mod transform;

pub use self::csv::{parse_date, read_source, SourceColumns, SourceError, SourceTable};
pub use columnar::ColumnarError;
pub use learn::{learn, summarize_store, LearnError, LearnOutcome, LearnStats};
pub use merchant::{MerchantResolver, MerchantTables};
pub use normalize::normalize;
pub use resolver::{CategoryResolver, MatchStage, ProvenanceCounter, Resolution};
pub use rules::{CategoryRule, MatchType, RuleError, RuleRow, RuleSet};
pub use transform::{
    discover_mapping, transform, MerchantCount, Pipeline, TransformError, TransformOptions,
    TransformSummary,
};
