// Table catalog and file location resolution

use crate::cfg::Config;
use anyhow::{Context, Result};
use std::error::Error;
use std::fmt;
use std::fs;
use std::path::PathBuf;

// ============================================================================
// TABLE CATALOG
// ============================================================================

/// Fixed catalog: table name -> file name under `{db_dir}/tables/`.
/// The exposures reference table is read-only and lives in the package data
/// directory, not here.
pub const TABLES: &[(&str, &str)] = &[
    ("transactions", "transactions.csv"),
    ("balances", "balances.csv"),
    ("securities", "securities.csv"),
    ("acct_info", "account_info.csv"),
    ("positions", "positions.csv"),
];

/// Valid table names, for error messages.
pub fn table_names() -> Vec<&'static str> {
    TABLES.iter().map(|(name, _)| *name).collect()
}

// ============================================================================
// ERRORS
// ============================================================================

/// Write or read requested for a table outside the fixed catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownTableError {
    pub requested: String,
}

impl fmt::Display for UnknownTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "table ({}) not supported, try one of: {:?}",
            self.requested,
            table_names()
        )
    }
}

impl Error for UnknownTableError {}

// ============================================================================
// FILE LOCATIONS
// ============================================================================

/// Resolve a table name (case-insensitive) to its file path, creating the
/// tables directory on first use.
pub fn table_file(table: &str, cfg: &Config) -> Result<PathBuf> {
    let base = cfg.tables_dir();
    if !base.exists() {
        fs::create_dir_all(&base)
            .with_context(|| format!("creating tables directory {}", base.display()))?;
    }
    let lowered = table.to_lowercase();
    let file_name = TABLES
        .iter()
        .find(|(name, _)| *name == lowered)
        .map(|(_, file)| *file)
        .ok_or(UnknownTableError {
            requested: table.to_string(),
        })?;
    Ok(base.join(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_table_file_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        let lower = table_file("positions", &cfg).unwrap();
        let upper = table_file("POSITIONS", &cfg).unwrap();
        assert_eq!(lower, upper);
        assert!(lower.ends_with("tables/positions.csv"));
    }

    #[test]
    fn test_acct_info_maps_to_account_info_file() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        let path = table_file("acct_info", &cfg).unwrap();
        assert!(path.ends_with("tables/account_info.csv"));
    }

    #[test]
    fn test_unknown_table_lists_catalog() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        let err = table_file("exposures", &cfg).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("exposures"));
        for name in table_names() {
            assert!(message.contains(name), "missing {name} in: {message}");
        }
    }

    #[test]
    fn test_tables_directory_created() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::with_db_dir(dir.path());
        table_file("balances", &cfg).unwrap();
        assert!(cfg.tables_dir().is_dir());
    }
}
