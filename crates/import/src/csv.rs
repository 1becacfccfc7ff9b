use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use spendmap_core::{parse_money, Money, TransactionRow};
use thiserror::Error;

use crate::util::{pick_first_present, read_lossy};

/// Header row markers: a line containing both tokens starts the table.
pub const HEADER_CANDIDATES: &[(&str, &str)] = &[
    ("Date", "Description"),
    ("Posting Date", "Description"),
    ("Date", "Payee"),
    ("Transaction Date", "Description"),
];

const DATE_COLUMNS: &[&str] = &["Date", "Posting Date", "Transaction Date"];
const DEBIT_COLUMNS: &[&str] = &["Debit", "Debits", "Withdrawal", "Withdrawals"];
const CREDIT_COLUMNS: &[&str] = &["Credit", "Credits", "Deposit", "Deposits"];
const AMOUNT_COLUMNS: &[&str] = &["Amount", "Transaction Amount"];
const BALANCE_COLUMNS: &[&str] = &["Running Balance", "Balance"];
const DESCRIPTION_COLUMNS: &[&str] = &["Description", "Payee", "Memo", "Details"];
const CATEGORY_COLUMNS: &[&str] = &["Category"];

// "%m/%d/%y" must precede "%m/%d/%Y", which would read "24" as year 24.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d", "%Y/%m/%d", "%m-%d-%Y", "%d-%b-%Y", "%b %d, %Y",
];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Source file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Could not find header row; expected one of: {}", header_hint())]
    NoHeaderRow,
    #[error("No date column found.")]
    NoDateColumn,
    #[error("No amount columns found.")]
    NoAmountColumn,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

fn header_hint() -> String {
    HEADER_CANDIDATES
        .iter()
        .map(|(a, b)| format!("{a}+{b}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmountColumns {
    /// Signed amount is credit minus debit; an absent side counts as zero.
    DebitCredit {
        debit: Option<usize>,
        credit: Option<usize>,
    },
    Single(usize),
}

/// Positions of the columns the pipeline consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceColumns {
    pub date: usize,
    pub amount: AmountColumns,
    pub balance: Option<usize>,
    pub description: Option<usize>,
    pub category: Option<usize>,
}

impl SourceColumns {
    pub fn detect(headers: &[String]) -> Result<Self, SourceError> {
        let date = pick_first_present(headers, DATE_COLUMNS).ok_or(SourceError::NoDateColumn)?;

        let debit = pick_first_present(headers, DEBIT_COLUMNS);
        let credit = pick_first_present(headers, CREDIT_COLUMNS);
        let amount = if debit.is_some() || credit.is_some() {
            AmountColumns::DebitCredit { debit, credit }
        } else {
            AmountColumns::Single(
                pick_first_present(headers, AMOUNT_COLUMNS).ok_or(SourceError::NoAmountColumn)?,
            )
        };

        Ok(Self {
            date,
            amount,
            balance: pick_first_present(headers, BALANCE_COLUMNS),
            description: pick_first_present(headers, DESCRIPTION_COLUMNS),
            category: pick_first_present(headers, CATEGORY_COLUMNS),
        })
    }
}

/// The parsed source export: trimmed headers, detected columns and one
/// row per record with amount, balance, date and raw text filled in.
#[derive(Debug, Clone)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub columns: SourceColumns,
    pub rows: Vec<TransactionRow>,
}

/// Index of the first line that carries one of the header token pairs.
pub fn find_header_line(text: &str) -> Option<usize> {
    text.lines().position(|line| {
        HEADER_CANDIDATES
            .iter()
            .any(|(a, b)| line.contains(a) && line.contains(b))
    })
}

pub fn read_source(path: &Path) -> Result<SourceTable, SourceError> {
    if !path.exists() {
        return Err(SourceError::NotFound(path.to_path_buf()));
    }
    let text = read_lossy(path)?;
    parse_source(&text)
}

/// Parses an export whose table may be preceded by metadata lines.
pub fn parse_source(text: &str) -> Result<SourceTable, SourceError> {
    let header_line = find_header_line(text).ok_or(SourceError::NoHeaderRow)?;
    tracing::debug!("Header row found on line {}", header_line + 1);
    let offset: usize = text
        .split_inclusive('\n')
        .take(header_line)
        .map(str::len)
        .sum();

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text[offset..].as_bytes());
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let columns = SourceColumns::detect(&headers)?;
    tracing::debug!("Source columns: {columns:?}");

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut cells: Vec<String> = record.iter().map(|s| s.to_string()).collect();
        cells.resize(headers.len(), String::new());
        rows.push(parse_row(cells, &columns));
    }

    let dated = rows.iter().filter(|r| r.date.is_some()).count();
    if !rows.is_empty() && dated == 0 {
        tracing::warn!("No date in column '{}' could be parsed", headers[columns.date]);
    }

    Ok(SourceTable { headers, columns, rows })
}

fn parse_row(cells: Vec<String>, columns: &SourceColumns) -> TransactionRow {
    let cell = |idx: Option<usize>| idx.and_then(|i| cells.get(i)).map(String::as_str);

    let amount = match columns.amount {
        AmountColumns::Single(col) => cell(Some(col)).and_then(parse_money),
        AmountColumns::DebitCredit { debit, credit } => {
            let side = |idx: Option<usize>| match cell(idx) {
                Some(s) => parse_money(s),
                None => Some(Money::zero()),
            };
            match (side(credit), side(debit)) {
                (Some(c), Some(d)) => Some(c - d),
                _ => None,
            }
        }
    };
    let balance = columns.balance.and_then(|i| cell(Some(i))).and_then(parse_money);
    let date = cell(Some(columns.date)).and_then(parse_date);
    let description = cell(columns.description).unwrap_or_default().to_string();
    let category_raw = cell(columns.category).unwrap_or_default().to_string();

    let mut row = TransactionRow::new(&description, cells);
    row.amount = amount;
    row.balance = balance;
    row.date = date;
    row.category_raw = category_raw;
    row
}

/// Tries the common bank date layouts; a trailing time part is ignored.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let try_formats = |s: &str| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    };
    try_formats(s)
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
        .or_else(|| s.split_whitespace().next().and_then(try_formats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn money(d: rust_decimal::Decimal) -> Option<Money> {
        Some(Money::from_decimal(d))
    }

    // ── parse_date ────────────────────────────────────────────────────────────

    #[test]
    fn parse_date_us_slash() {
        assert_eq!(parse_date("01/15/2024"), NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn parse_date_iso_and_short_year() {
        assert_eq!(parse_date("2024-01-15"), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(parse_date("1/5/24"), NaiveDate::from_ymd_opt(2024, 1, 5));
    }

    #[test]
    fn parse_date_with_time_part() {
        assert_eq!(parse_date("2024-01-15 08:30:00"), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(parse_date("2024-01-15T08:30:00"), NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn parse_date_invalid_is_none() {
        assert_eq!(parse_date("not-a-date"), None);
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("13/45/2024"), None);
    }

    // ── header detection ──────────────────────────────────────────────────────

    #[test]
    fn header_found_after_metadata() {
        let text = "Description,,Summary Amt.\nBeginning balance,,100\n\nDate,Description,Amount\n";
        assert_eq!(find_header_line(text), Some(3));
    }

    #[test]
    fn header_found_after_metadata_with_cr_line_endings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mac.csv");
        std::fs::write(
            &path,
            "Account summary,,\rBeginning balance,,100\r\rDate,Description,Amount\r01/02/2024,NETFLIX.COM,-15.49\r",
        )
        .unwrap();
        let table = read_source(&path).unwrap();
        assert_eq!(table.headers, ["Date", "Description", "Amount"]);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].raw_description, "NETFLIX.COM");
        assert_eq!(table.rows[0].amount, money(dec!(-15.49)));
    }

    #[test]
    fn header_missing() {
        assert_eq!(find_header_line("a,b\n1,2\n"), None);
        assert!(matches!(parse_source("a,b\n1,2\n"), Err(SourceError::NoHeaderRow)));
    }

    // ── column detection ──────────────────────────────────────────────────────

    #[test]
    fn no_date_column_is_fatal() {
        // Header markers match, but no column is named like a date.
        let text = "Trade Date,Description,Amount\n";
        assert!(matches!(parse_source(text), Err(SourceError::NoDateColumn)));
    }

    #[test]
    fn no_amount_column_is_fatal() {
        let text = "Date,Description,Value\n01/01/2024,X,1\n";
        assert!(matches!(parse_source(text), Err(SourceError::NoAmountColumn)));
    }

    // ── full parse ────────────────────────────────────────────────────────────

    #[test]
    fn single_amount_column() {
        let text = "Account summary\n\
                    Date,Description,Amount,Running Bal.\n\
                    01/15/2024,AMAZON,\"-1,049.99\",10.00\n\
                    01/16/2024,PAYROLL,(5.00),\n";
        let table = parse_source(text).unwrap();
        assert_eq!(table.headers, vec!["Date", "Description", "Amount", "Running Bal."]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].amount, money(dec!(-1049.99)));
        assert_eq!(table.rows[0].raw_description, "AMAZON");
        assert_eq!(table.rows[1].amount, money(dec!(-5)));
        assert_eq!(table.rows[0].date, NaiveDate::from_ymd_opt(2024, 1, 15));
        // "Running Bal." is not a recognised balance header.
        assert_eq!(table.columns.balance, None);
    }

    #[test]
    fn debit_credit_columns_subtract() {
        let text = "Posting Date,Description,Debit,Credit,Balance\n\
                    01/15/2024,PAYMENT,,100.00,500\n\
                    01/16/2024,CHARGE,50.00,,450\n\
                    01/17/2024,BROKEN,abc,,450\n";
        let table = parse_source(text).unwrap();
        assert_eq!(table.rows[0].amount, money(dec!(100)));
        assert_eq!(table.rows[1].amount, money(dec!(-50)));
        assert_eq!(table.rows[2].amount, None);
        assert_eq!(table.rows[1].balance, money(dec!(450)));
    }

    #[test]
    fn only_debit_column_present() {
        let text = "Date,Payee,Withdrawals\n01/01/2024,RENT,1200\n";
        let table = parse_source(text).unwrap();
        assert_eq!(
            table.columns.amount,
            AmountColumns::DebitCredit { debit: Some(2), credit: None }
        );
        assert_eq!(table.rows[0].amount, money(dec!(-1200)));
        assert_eq!(table.rows[0].raw_description, "RENT");
    }

    #[test]
    fn unparsable_cells_become_missing() {
        let text = "Date,Description,Amount\nsoon,X,n/a\n";
        let table = parse_source(text).unwrap();
        assert_eq!(table.rows[0].date, None);
        assert_eq!(table.rows[0].amount, None);
    }

    #[test]
    fn raw_category_and_short_rows() {
        let text = " Date , Description ,Amount,Category\n01/01/2024,COFFEE,-3,Dining\n01/02/2024,SHORT\n";
        let table = parse_source(text).unwrap();
        assert_eq!(table.headers[0], "Date");
        assert_eq!(table.rows[0].category_raw, "Dining");
        assert_eq!(table.rows[1].source.len(), 4);
        assert_eq!(table.rows[1].amount, Some(Money::zero()));
    }

    #[test]
    fn read_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_source(&dir.path().join("nope.csv")).unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
        assert!(err.to_string().contains("nope.csv"));
    }
}
