//! Category taxonomy: the canonical labels, the alias table and the built-in
//! keyword rules.
//!
//! All tables are ordered slices. Matching is first-hit-wins in declaration
//! order, so the order of entries is part of the behaviour.

pub const UNCATEGORIZED: &str = "Uncategorized";

/// A built-in rule: fires when any trigger is a substring of the haystack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordRule {
    pub triggers: &'static [&'static str],
    pub category: &'static str,
}

impl KeywordRule {
    pub fn matches(&self, haystack: &str) -> bool {
        self.triggers.iter().any(|t| haystack.contains(t))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Taxonomy {
    canonical: &'static [&'static str],
    aliases: &'static [(&'static str, &'static str)],
    keyword_rules: &'static [KeywordRule],
}

const CANONICAL: &[&str] = &[
    "Income",
    "Transfers",
    "Fees",
    "Taxes",
    "Housing",
    "Utilities",
    "Insurance",
    "Healthcare",
    "Transportation",
    "Fuel",
    "Groceries",
    "Dining",
    "Shopping",
    "Subscriptions",
    "Entertainment",
    "Travel",
    "Household",
    "Gifts/Charity",
    UNCATEGORIZED,
];

const ALIASES: &[(&str, &str)] = &[
    ("atm fee", "Fees"),
    ("service fee", "Fees"),
    ("fee", "Fees"),
    ("mortgage", "Housing"),
    ("rent", "Housing"),
    ("hoa", "Housing"),
    ("electric", "Utilities"),
    ("water", "Utilities"),
    ("sewer", "Utilities"),
    ("gas bill", "Utilities"),
    ("internet", "Utilities"),
    ("phone", "Utilities"),
    ("insurance", "Insurance"),
    ("doctor", "Healthcare"),
    ("dental", "Healthcare"),
    ("pharmacy", "Healthcare"),
    ("medical", "Healthcare"),
    ("hospital", "Healthcare"),
    ("transportation", "Transportation"),
    ("tolls", "Transportation"),
    ("parking", "Transportation"),
    ("fuel", "Fuel"),
    ("gas", "Fuel"),
    ("grocery", "Groceries"),
    ("groceries", "Groceries"),
    ("restaurant", "Dining"),
    ("dining", "Dining"),
    ("coffee", "Dining"),
    ("shopping", "Shopping"),
    ("subscription", "Subscriptions"),
    ("subscriptions", "Subscriptions"),
    ("entertainment", "Entertainment"),
    ("travel", "Travel"),
    ("airfare", "Travel"),
    ("airline", "Travel"),
    ("hotel", "Travel"),
    ("household", "Household"),
    ("gift", "Gifts/Charity"),
    ("charity", "Gifts/Charity"),
    ("donation", "Gifts/Charity"),
    ("tithe", "Gifts/Charity"),
    ("transfer", "Transfers"),
    ("zelle", "Transfers"),
    ("online banking transfer", "Transfers"),
    ("salary", "Income"),
    ("payroll", "Income"),
    ("ssa", "Income"),
    ("deposit", "Income"),
    ("refund", "Income"),
    ("tax", "Taxes"),
    ("irs", "Taxes"),
];

// Trailing spaces in "bp ", "att " and "max " keep them from matching inside words.
const KEYWORD_RULES: &[KeywordRule] = &[
    KeywordRule {
        triggers: &["whole foods", "market basket", "stop & shop", "trader joe", "aldi", "shaw's"],
        category: "Groceries",
    },
    KeywordRule {
        triggers: &["mcdonald", "starbucks", "dunkin", "chipotle", "pizza", "panera", "cafe", "restaurant"],
        category: "Dining",
    },
    KeywordRule {
        triggers: &["shell", "exxon", "bp ", "mobil", "sunoco"],
        category: "Fuel",
    },
    KeywordRule {
        triggers: &["uber", "lyft", "mbta", "amtrak"],
        category: "Transportation",
    },
    KeywordRule {
        triggers: &["comcast", "verizon", "xfinity", "spectrum", "att ", "t-mobile"],
        category: "Utilities",
    },
    KeywordRule {
        triggers: &["netflix", "hulu", "spotify", "max ", "disney+"],
        category: "Subscriptions",
    },
    KeywordRule {
        triggers: &["amazon", "walmart", "target", "costco", "best buy"],
        category: "Shopping",
    },
    KeywordRule {
        triggers: &[
            "marriott",
            "hilton",
            "airbnb",
            "delta",
            "american airlines",
            "united airlines",
            "jetblue",
        ],
        category: "Travel",
    },
    KeywordRule {
        triggers: &["cvs", "walgreens", "rite aid"],
        category: "Healthcare",
    },
    KeywordRule {
        triggers: &["geico", "progressive", "allstate", "state farm"],
        category: "Insurance",
    },
    KeywordRule {
        triggers: &["irs", "tax"],
        category: "Taxes",
    },
    KeywordRule {
        triggers: &["church", "salvation army", "red cross"],
        category: "Gifts/Charity",
    },
];

static BUILTIN: Taxonomy = Taxonomy {
    canonical: CANONICAL,
    aliases: ALIASES,
    keyword_rules: KEYWORD_RULES,
};

impl Taxonomy {
    pub const fn new(
        canonical: &'static [&'static str],
        aliases: &'static [(&'static str, &'static str)],
        keyword_rules: &'static [KeywordRule],
    ) -> Self {
        Self { canonical, aliases, keyword_rules }
    }

    /// The packaged household taxonomy.
    pub fn builtin() -> &'static Taxonomy {
        &BUILTIN
    }

    pub fn canonical(&self) -> &'static [&'static str] {
        self.canonical
    }

    pub fn is_canonical(&self, category: &str) -> bool {
        self.canonical.iter().any(|c| *c == category)
    }

    /// Maps a free-form category to its canonical spelling.
    ///
    /// Case-insensitive match against the canonical list, then exact
    /// lowercase alias lookup, else the input is returned unchanged so
    /// user-coined categories survive. Empty input is `Uncategorized`.
    pub fn canonicalize(&self, category: &str) -> String {
        let category = category.trim();
        if category.is_empty() {
            return UNCATEGORIZED.to_string();
        }
        if let Some(c) = self
            .canonical
            .iter()
            .find(|c| c.eq_ignore_ascii_case(category))
        {
            return (*c).to_string();
        }
        match self.alias(&category.to_lowercase()) {
            Some(c) => c.to_string(),
            None => category.to_string(),
        }
    }

    /// Exact alias-key lookup.
    pub fn alias(&self, key: &str) -> Option<&'static str> {
        self.aliases
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, c)| *c)
    }

    /// First alias key (in table order) that is a substring of `haystack`.
    pub fn scan_aliases(&self, haystack: &str) -> Option<&'static str> {
        self.aliases
            .iter()
            .find(|(k, _)| haystack.contains(k))
            .map(|(_, c)| *c)
    }

    /// First keyword rule group (in table order) with a trigger in `haystack`.
    pub fn match_keywords(&self, haystack: &str) -> Option<&'static str> {
        self.keyword_rules
            .iter()
            .find(|r| r.matches(haystack))
            .map(|r| r.category)
    }
}
