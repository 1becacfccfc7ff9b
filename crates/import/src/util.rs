use std::io;
use std::path::Path;

/// Declares `fn $name() -> &'static Regex`, compiled on first use.
macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static ::regex::Regex {
            static R: ::std::sync::OnceLock<::regex::Regex> = ::std::sync::OnceLock::new();
            R.get_or_init(|| ::regex::Regex::new($pat).expect("invalid regex"))
        }
    };
}

/// Reads a text file, replacing invalid UTF-8 and dropping a leading BOM.
/// `\r\n` and bare `\r` line endings come back as `\n`.
pub fn read_lossy(path: &Path) -> io::Result<String> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8_lossy(&bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    Ok(text.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Title-cases a string: an alphabetic character is uppercased when the
/// character before it is not alphabetic, and lowercased otherwise.
///
/// `"trader joe's"` becomes `"Trader Joe'S"` and `"7eleven"` becomes
/// `"7Eleven"`; acronym fixes are applied afterwards by the caller.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Index of the first of `names` present in `headers`, compared
/// case-insensitively. Earlier names win over later ones.
pub fn pick_first_present(headers: &[String], names: &[&str]) -> Option<usize> {
    names.iter().find_map(|name| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    })
}
