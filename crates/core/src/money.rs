use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(Decimal);

impl Money {
    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal.round_dp(2))
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }

    /// Keeps every digit of `decimal`; bank cells are not rounded to cents.
    pub fn exact(decimal: Decimal) -> Self {
        Money(decimal)
    }

    /// Plain rendering for CSV cells: at least two places (`-45.10`), more
    /// when the value carries them (`1.005`).
    pub fn to_plain_string(self) -> String {
        let trimmed = self.0.normalize();
        if trimmed.scale() > 2 {
            trimmed.to_string()
        } else {
            format!("{:.2}", self.0)
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

/// Parses a bank money cell such as `$1,234.56` or `(45.10)`.
///
/// An empty cell is zero. Anything that is not a number after stripping
/// currency noise yields `None` rather than an error.
pub fn parse_money(s: &str) -> Option<Money> {
    let s = s.trim();
    if s.is_empty() {
        return Some(Money::zero());
    }
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };
    let cleaned = s.replace(['$', ',', ' '], "");
    let dec = Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()?;
    let money = Money::exact(dec);
    Some(if negative && !money.is_zero() { -money } else { money })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(d: Decimal) -> Option<Money> {
        Some(Money::from_decimal(d))
    }

    #[test]
    fn parse_money_dollars_and_commas() {
        assert_eq!(parse_money("$1,234.56"), money(dec!(1234.56)));
    }

    #[test]
    fn parse_money_accounting_parens() {
        assert_eq!(parse_money("(45.10)"), money(dec!(-45.10)));
    }

    #[test]
    fn parse_money_empty_is_zero() {
        assert_eq!(parse_money(""), Some(Money::zero()));
        assert_eq!(parse_money("   "), Some(Money::zero()));
    }

    #[test]
    fn parse_money_invalid_is_none() {
        assert_eq!(parse_money("not-a-number"), None);
        assert_eq!(parse_money("12.3.4"), None);
        assert_eq!(parse_money("$"), None);
        assert_eq!(parse_money("()"), None);
        assert_eq!(parse_money("$ ,"), None);
    }

    #[test]
    fn parse_money_keeps_sub_cent_digits() {
        let m = parse_money("1.005").unwrap();
        assert_eq!(m.as_decimal(), dec!(1.005));
        assert_eq!(m.to_plain_string(), "1.005");
        assert_eq!(parse_money("(2.50)").unwrap().to_plain_string(), "-2.50");
        assert_eq!(parse_money("3.1000").unwrap().to_plain_string(), "3.10");
    }

    #[test]
    fn parse_money_signed() {
        assert_eq!(parse_money("-50.00"), money(dec!(-50)));
        assert_eq!(parse_money(" 7 "), money(dec!(7)));
    }

    #[test]
    fn plain_string_has_two_places() {
        assert_eq!(Money::from_decimal(dec!(-45.1)).to_plain_string(), "-45.10");
        assert_eq!(Money::zero().to_plain_string(), "0.00");
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_decimal(dec!(10.00));
        let b = Money::from_decimal(dec!(2.50));
        assert_eq!((a - b).as_decimal(), dec!(7.50));
        assert_eq!((a + b).as_decimal(), dec!(12.50));
        assert_eq!((-b).as_decimal(), dec!(-2.50));
    }
}
