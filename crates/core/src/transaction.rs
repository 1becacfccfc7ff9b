use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::category::UNCATEGORIZED;
use super::money::Money;

/// One bank transaction, as read from the source export and then annotated.
///
/// `amount` and `date` are `None` when the source cell could not be parsed.
/// `source` holds the original cells in source column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub raw_description: String,
    pub clean_description: String,
    pub merchant: String,
    pub amount: Option<Money>,
    pub balance: Option<Money>,
    pub date: Option<NaiveDate>,
    pub category: String,
    pub category_raw: String,
    pub source: Vec<String>,
}

impl TransactionRow {
    pub fn new(raw_description: &str, source: Vec<String>) -> Self {
        TransactionRow {
            raw_description: raw_description.to_string(),
            clean_description: String::new(),
            merchant: String::new(),
            amount: None,
            balance: None,
            date: None,
            category: UNCATEGORIZED.to_string(),
            category_raw: String::new(),
            source,
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        self.category == UNCATEGORIZED
    }

    /// ISO `YYYY-MM-DD`, or empty when the date is missing.
    pub fn date_cell(&self) -> String {
        self.date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }

    pub fn amount_cell(&self) -> String {
        self.amount.map(Money::to_plain_string).unwrap_or_default()
    }

    pub fn balance_cell(&self) -> String {
        self.balance.map(Money::to_plain_string).unwrap_or_default()
    }
}
