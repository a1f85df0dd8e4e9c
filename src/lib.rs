// ofxdb - Core Library
// Statement aggregation pipeline and risk views for OFX financial data

pub mod cfg;
pub mod model;      // Statement document tree (parser contract)
pub mod record;     // Flat records and the per-run account context
pub mod flatten;    // Model flattening: tree -> records
pub mod files;      // Table catalog and file locations
pub mod store;      // Append-only CSV table store
pub mod agg;        // Aggregation driver
pub mod risk;       // Portfolio risk engine
pub mod accounts;   // Identity source (ofxget user config)
pub mod extract;    // Statement fetch via ofxget

// Re-export commonly used types
pub use cfg::Config;
pub use model::{Balances, Document, LeafValue, Statement, StatementNode};
pub use record::{AccountContext, Record, Scalar};
pub use flatten::{
    flatten_into, record_from_model, records_from_model, FlattenError, Models,
};
pub use files::{table_file, UnknownTableError, TABLES};
pub use store::{read_table, write_records, Frame, INDEX_COL};
pub use agg::{aggregate, aggregate_document, StatementError, StatementParser, ACCTID};
pub use risk::{compute_risk, read_exposures, risk, Exposure, RiskSummary};
pub use accounts::{get_user_cfg, UserConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
