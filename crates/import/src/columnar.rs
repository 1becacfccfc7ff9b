//! Optional Parquet snapshot of the transformed table.
//!
//! DuckDB reads the transformed CSV back and copies it out as Parquet, so the
//! snapshot always has the same columns as the CSV. Only compiled in with the
//! `parquet` feature.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColumnarError {
    #[error("Parquet output is not available in this build (enable the `parquet` feature)")]
    Unavailable,
    #[cfg(feature = "parquet")]
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),
}

/// `<stem>_transformed.parquet` next to the transformed CSV.
pub fn parquet_path_for(transformed_csv: &Path) -> PathBuf {
    transformed_csv.with_extension("parquet")
}

#[cfg(feature = "parquet")]
fn sql_literal(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "''"))
}

#[cfg(feature = "parquet")]
pub fn write_parquet(transformed_csv: &Path, out: &Path) -> Result<(), ColumnarError> {
    let config = duckdb::Config::default().enable_autoload_extension(false)?;
    let conn = duckdb::Connection::open_in_memory_with_flags(config)?;
    conn.execute_batch(&format!(
        "COPY (SELECT * FROM read_csv({}, header = true, auto_detect = true)) TO {} (FORMAT PARQUET)",
        sql_literal(transformed_csv),
        sql_literal(out)
    ))?;
    tracing::info!("Wrote Parquet snapshot to {}", out.display());
    Ok(())
}

#[cfg(not(feature = "parquet"))]
pub fn write_parquet(_transformed_csv: &Path, _out: &Path) -> Result<(), ColumnarError> {
    Err(ColumnarError::Unavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parquet_path_replaces_extension() {
        assert_eq!(
            parquet_path_for(Path::new("/data/acct_transformed.csv")),
            PathBuf::from("/data/acct_transformed.parquet")
        );
    }

    #[cfg(not(feature = "parquet"))]
    #[test]
    fn unavailable_without_feature() {
        let err = write_parquet(Path::new("a.csv"), Path::new("a.parquet")).unwrap_err();
        assert!(matches!(err, ColumnarError::Unavailable));
    }

    #[cfg(feature = "parquet")]
    #[test]
    fn writes_parquet_with_same_rows() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("it's_transformed.csv");
        std::fs::write(&csv_path, "Account,Amount\nA,1.50\nA,-2.00\n").unwrap();
        let out = parquet_path_for(&csv_path);
        write_parquet(&csv_path, &out).unwrap();

        let conn = duckdb::Connection::open_in_memory().unwrap();
        let count: i64 = conn
            .query_row(
                &format!("SELECT count(*) FROM read_parquet({})", sql_literal(&out)),
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }
}
