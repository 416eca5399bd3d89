//! Account list loading.
//!
//! The input is a CSV file with a header row; the only column read is
//! `account_id`. Rows without a usable value are skipped with a warning.

use std::io::Read;
use std::path::Path;
use tracing::warn;

use crate::cloud::MigrationError;
use crate::types::AccountId;

pub const ACCOUNT_ID_COLUMN: &str = "account_id";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadedAccounts {
    /// In file order.
    pub accounts: Vec<AccountId>,
    /// 1-based data row numbers that were skipped.
    pub skipped_rows: Vec<usize>,
}

pub fn load_accounts(path: &Path) -> Result<LoadedAccounts, MigrationError> {
    let file = std::fs::File::open(path).map_err(|e| MigrationError::Input {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    read_accounts(file).map_err(|e| match e {
        MigrationError::Input { message, .. } => MigrationError::Input {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })
}

pub fn read_accounts<R: Read>(reader: R) -> Result<LoadedAccounts, MigrationError> {
    let input_error = |message: String| MigrationError::Input {
        path: "<input>".to_string(),
        message,
    };

    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let column = csv_reader
        .headers()
        .map_err(|e| input_error(e.to_string()))?
        .iter()
        .position(|header| header == ACCOUNT_ID_COLUMN);

    let mut loaded = LoadedAccounts::default();
    for (index, record) in csv_reader.records().enumerate() {
        let row = index + 1;
        let record = record.map_err(|e| input_error(e.to_string()))?;

        let value = column.and_then(|column| record.get(column));
        match value.map(AccountId::new) {
            Some(Ok(account_id)) => loaded.accounts.push(account_id),
            _ => {
                warn!(
                    "Skipping row {} in CSV because it does not contain an '{}' field: {:?}",
                    row,
                    ACCOUNT_ID_COLUMN,
                    record.iter().collect::<Vec<_>>()
                );
                loaded.skipped_rows.push(row);
            }
        }
    }
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(loaded: &LoadedAccounts) -> Vec<&str> {
        loaded.accounts.iter().map(AccountId::as_str).collect()
    }

    #[test]
    fn test_reads_account_column_in_order() {
        let csv = "name,account_id\nalpha,111111111111\nbeta, 222222222222 \n";
        let loaded = read_accounts(csv.as_bytes()).unwrap();
        assert_eq!(ids(&loaded), vec!["111111111111", "222222222222"]);
        assert!(loaded.skipped_rows.is_empty());
    }

    #[test]
    fn test_short_and_blank_rows_are_skipped() {
        let csv = "name,account_id\nalpha,111111111111\nbeta\ngamma,\ndelta,333333333333\n";
        let loaded = read_accounts(csv.as_bytes()).unwrap();
        assert_eq!(ids(&loaded), vec!["111111111111", "333333333333"]);
        assert_eq!(loaded.skipped_rows, vec![2, 3]);
    }

    #[test]
    fn test_missing_column_skips_everything() {
        let csv = "id\n111111111111\n222222222222\n";
        let loaded = read_accounts(csv.as_bytes()).unwrap();
        assert!(loaded.accounts.is_empty());
        assert_eq!(loaded.skipped_rows, vec![1, 2]);
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let err = load_accounts(Path::new("/nonexistent/accounts.csv")).unwrap_err();
        assert!(matches!(err, MigrationError::Input { ref path, .. } if path.contains("accounts.csv")));
    }
}
