// Package-wide configuration - database layout, fetch constants, timezone policy

use std::env;
use std::path::PathBuf;

// ============================================================================
// DATABASE DEFINITIONS
// ============================================================================

/// Directory name of the database root under $HOME
pub const DB_FOLDER: &str = "ofxdb";

/// Subfolder holding fetched statement files
pub const STMT_FOLDER: &str = "stmt";

/// Subfolder holding the append-only tables
pub const TABLES_FOLDER: &str = "tables";

/// Prefix of the "latest fetch" statement file for a (server, user) pair
pub const CURRENT_PREFIX: &str = "current";

/// Extension of fetched statement files
pub const OFX_EXTENSION: &str = "ofx";

// ============================================================================
// OFXGET DEFINITIONS
// ============================================================================

/// Reserved section name in the user config; never a real server
pub const DEFAULT_SERVER: &str = "DEFAULT";

/// Key of the user id inside a server section of the user config
pub const CFG_USER_LABEL: &str = "user";

/// ofxget config file name, located in the ofxtools user config directory
pub const USER_CFG_FILE: &str = "ofxget.cfg";

// ============================================================================
// CONFIG
// ============================================================================

/// Resolved file-system layout for one ofxdb installation.
///
/// All timestamps in the pipeline are pinned to UTC; there is no per-config
/// timezone knob (mirrors the OFX convention of UTC-stamped datetimes).
#[derive(Debug, Clone)]
pub struct Config {
    /// Database root, holds `stmt/` and `tables/`
    pub db_dir: PathBuf,
    /// Auxiliary data shipped with the package (exposures reference table)
    pub data_dir: PathBuf,
    /// ofxget-style user config file (server sections with user ids)
    pub user_cfg: PathBuf,
}

impl Config {
    /// Layout rooted at an explicit database directory.
    pub fn with_db_dir(db_dir: impl Into<PathBuf>) -> Self {
        let db_dir = db_dir.into();
        Config {
            data_dir: db_dir.join("data"),
            user_cfg: db_dir.join(USER_CFG_FILE),
            db_dir,
        }
    }

    /// Default layout: `$HOME/ofxdb` database, package `data/` directory,
    /// ofxget config under `$HOME/.config/ofxtools/`.
    pub fn from_env() -> Self {
        let home = env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
        Config {
            db_dir: home.join(DB_FOLDER),
            data_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data"),
            user_cfg: home.join(".config").join("ofxtools").join(USER_CFG_FILE),
        }
    }

    /// Path of the latest fetched statement file for a (server, user) pair.
    pub fn stmt_file(&self, server: &str, user: &str) -> PathBuf {
        self.db_dir.join(STMT_FOLDER).join(format!(
            "{}_{}_{}.{}",
            CURRENT_PREFIX, server, user, OFX_EXTENSION
        ))
    }

    /// Directory holding fetched files of a given kind (`stmt`, `acctinfo`).
    pub fn fetch_dir(&self, kind: &str) -> PathBuf {
        self.db_dir.join(kind)
    }

    /// Directory holding the append-only tables.
    pub fn tables_dir(&self) -> PathBuf {
        self.db_dir.join(TABLES_FOLDER)
    }

    /// Location of the static exposures reference table.
    pub fn exposures_file(&self) -> PathBuf {
        self.data_dir.join("exposures.csv")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

/// True when a config section names the reserved DEFAULT server.
pub fn is_default_server(server: &str) -> bool {
    server == DEFAULT_SERVER
}
