pub mod account;
pub mod category;
pub mod money;
pub mod transaction;

pub use account::{AccountError, AccountId, DEFAULT_ACCOUNT_ID};
pub use category::{KeywordRule, Taxonomy, UNCATEGORIZED};
pub use money::{parse_money, Money};
pub use transaction::TransactionRow;
