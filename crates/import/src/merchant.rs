use regex::Regex;

use crate::normalize::collapse_whitespace;
use crate::util::title_case;

re!(re_card_purchase_prefix, r"^(debit|credit)\s+card\s+purchase\s+");
re!(re_purchase_prefix, r"^(purchase|pos)\s+");
re!(re_location_suffix, r"\b(store|stn|st|unit|loc)\b.*$");

/// Static lookup tables used to derive a merchant name.
#[derive(Debug, Clone, Copy)]
pub struct MerchantTables {
    /// Single tokens dropped before anything else (payment-rail noise).
    pub stopwords: &'static [&'static str],
    /// `(substring, canonical merchant)`, first hit wins.
    pub aliases: &'static [(&'static str, &'static str)],
    /// Spellings restored after title-casing.
    pub acronyms: &'static [&'static str],
}

const STOPWORDS: &[&str] = &[
    "authorization",
    "auth",
    "purchase",
    "pos",
    "debit",
    "credit",
    "recurring",
    "online",
    "banking",
    "transfer",
    "zelle",
    "visa",
    "mastercard",
    "mc",
    "card",
    "payment",
    "pymt",
    "ach",
    "echeck",
    "ck",
    "trnsfr",
    "fee",
    "adj",
    "refund",
];

const MERCHANT_ALIASES: &[(&str, &str)] = &[
    ("the home depot", "Home Depot"),
    ("home depot", "Home Depot"),
    ("walmart.com", "Walmart"),
    ("wal-mart", "Walmart"),
    ("amazon marketplace", "Amazon"),
    ("amzn mktp", "Amazon"),
    ("amzn digital", "Amazon"),
    ("starbucks coffee", "Starbucks"),
    ("starbucks", "Starbucks"),
    ("dunkin donuts", "Dunkin"),
    ("wholefoods", "Whole Foods"),
    ("whole foods market", "Whole Foods"),
    ("trader joes", "Trader Joe's"),
    ("market basket", "Market Basket"),
    ("stop & shop", "Stop & Shop"),
    ("shell oil", "Shell"),
    ("exxonmobil", "Exxon"),
    ("geico insurance", "GEICO"),
];

const ACRONYMS: &[&str] = &["GEICO", "IRS", "MBTA", "BP", "AT&T"];

static BUILTIN: MerchantTables = MerchantTables {
    stopwords: STOPWORDS,
    aliases: MERCHANT_ALIASES,
    acronyms: ACRONYMS,
};

impl MerchantTables {
    pub fn builtin() -> &'static MerchantTables {
        &BUILTIN
    }
}

/// Derives a stable display name from a normalized description.
pub struct MerchantResolver {
    tables: &'static MerchantTables,
    acronyms: Vec<(Regex, &'static str)>,
}

impl MerchantResolver {
    pub fn new(tables: &'static MerchantTables) -> Self {
        let acronyms = tables
            .acronyms
            .iter()
            .filter_map(|keep| {
                let pattern = format!(r"\b{}\b", regex::escape(&title_case(keep)));
                Regex::new(&pattern).ok().map(|re| (re, *keep))
            })
            .collect();
        Self { tables, acronyms }
    }

    /// `normalized` must already be in [`crate::normalize::normalize`] form.
    pub fn resolve(&self, normalized: &str) -> String {
        if normalized.is_empty() {
            return String::new();
        }

        let kept: Vec<&str> = normalized
            .split(' ')
            .filter(|tok| !tok.is_empty() && !self.tables.stopwords.iter().any(|s| s == tok))
            .collect();
        let base = collapse_whitespace(&kept.join(" "));
        let base = re_card_purchase_prefix().replace(&base, "");
        let base = re_purchase_prefix().replace(&base, "").into_owned();

        let alias_key = re_location_suffix().replace(&base, "");
        let alias_key = alias_key.trim();
        if let Some((_, name)) = self
            .tables
            .aliases
            .iter()
            .find(|(k, _)| alias_key.contains(k))
        {
            return (*name).to_string();
        }

        if base.is_empty() {
            return String::new();
        }

        let mut name = title_case(&base);
        for (re, keep) in &self.acronyms {
            name = re.replace_all(&name, *keep).into_owned();
        }
        name
    }
}

impl Default for MerchantResolver {
    fn default() -> Self {
        Self::new(MerchantTables::builtin())
    }
}
