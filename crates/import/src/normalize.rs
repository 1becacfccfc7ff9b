re!(re_hash_id, r"#\d+");
re!(re_noise_chars, r"[^a-z0-9 &.'-]");
re!(re_digit_run, r"\b\d{3,}\b");
re!(re_whitespace, r"\s+");

/// Canonical text form that every matcher and every rule pattern uses.
///
/// Lowercases, drops `#1234` transaction ids, replaces punctuation outside
/// `& . ' -` with spaces, drops word-bounded runs of 3+ digits and collapses
/// whitespace. Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    let t = raw.to_lowercase();
    let t = re_hash_id().replace_all(&t, " ");
    let t = re_noise_chars().replace_all(&t, " ");
    let t = re_digit_run().replace_all(&t, " ");
    collapse_whitespace(&t)
}

pub fn collapse_whitespace(s: &str) -> String {
    re_whitespace().replace_all(s, " ").trim().to_string()
}
