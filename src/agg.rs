// Aggregation driver - fetched documents -> append-only tables
//
// For every configured (server, user) pair: read the latest fetched
// statement file, have the parser collaborator turn it into a Document, then
// flatten and persist account info, transactions, positions, balances and
// the document-level securities list.

use crate::accounts;
use crate::cfg::{CFG_USER_LABEL, Config};
use crate::flatten::{records_from_model, Models};
use crate::model::{Document, Statement};
use crate::record::{AccountContext, Record};
use crate::store::write_records;
use anyhow::{Context, Result};
use log::{debug, info};
use std::error::Error;
use std::fmt;
use std::fs;

/// Field every account record must carry; seeds all per-statement records.
pub const ACCTID: &str = "acctid";

// ============================================================================
// PARSER CONTRACT
// ============================================================================

/// Collaborator contract: deserialize one raw fetched statement file into a
/// statement document tree. The pipeline never parses OFX text itself.
pub trait StatementParser {
    fn parse(&self, raw: &[u8]) -> Result<Document>;
}

// ============================================================================
// ERRORS
// ============================================================================

/// Fatal per-statement inconsistencies.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementError {
    /// Account flattening yielded more than one record; downstream seeding
    /// assumes exactly one account identity per statement.
    AmbiguousAccount { count: usize },
    /// Account record carries no acctid; nothing is written for the
    /// statement, including the acct_info row.
    MissingAccountId { record: Record },
}

impl fmt::Display for StatementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementError::AmbiguousAccount { count } => write!(
                f,
                "expected exactly 1 account record per statement, got {}",
                count
            ),
            StatementError::MissingAccountId { record } => {
                write!(f, "statement account info has no {}: {}", ACCTID, record)
            }
        }
    }
}

impl Error for StatementError {}

// ============================================================================
// MODEL PROCESSING
// ============================================================================

/// Flatten `models` seeded with `seed` and append to `table`. Empty
/// collections produce zero records and no write.
fn process_models(models: Models<'_>, seed: &Record, table: &str, cfg: &Config) -> Result<()> {
    let records = records_from_model(models, seed)
        .with_context(|| format!("flattening records for table {}", table))?;
    if records.is_empty() {
        return Ok(());
    }
    write_records(&records, table, cfg)
}

/// Process one statement: exactly one acct_info row plus the three
/// per-category tables, all seeded with the flattened account record.
pub fn process_statement(stmt: &Statement, ctx_record: &Record, cfg: &Config) -> Result<()> {
    // The account flattens to a single record; everything else written for
    // this statement is seeded with it (including acctid).
    let acct_records = records_from_model(Models::Single(&stmt.account), ctx_record)
        .context("flattening statement account info")?;
    if acct_records.len() != 1 {
        return Err(StatementError::AmbiguousAccount {
            count: acct_records.len(),
        }
        .into());
    }
    let acct_record = &acct_records[0];
    if !acct_record.contains_key(ACCTID) {
        return Err(StatementError::MissingAccountId {
            record: acct_record.clone(),
        }
        .into());
    }
    write_records(&acct_records, "acct_info", cfg)?;

    process_models(Models::Seq(&stmt.transactions), acct_record, "transactions", cfg)?;
    process_models(Models::Seq(&stmt.positions), acct_record, "positions", cfg)?;
    process_models(Models::Seq(&stmt.balances.ballist), acct_record, "balances", cfg)?;
    Ok(())
}

/// Process one parsed document under one run context: every statement, then
/// the document-level securities list (not account-scoped, so seeded with
/// the base context only).
pub fn aggregate_document(document: &Document, ctx: &AccountContext, cfg: &Config) -> Result<()> {
    let ctx_record = ctx.to_record();
    for stmt in &document.statements {
        process_statement(stmt, &ctx_record, cfg)?;
    }
    process_models(Models::Seq(&document.securities), &ctx_record, "securities", cfg)?;
    debug!(
        "aggregated {} statement(s) and {} security definition(s) for {}/{}",
        document.statements.len(),
        document.securities.len(),
        ctx.server,
        ctx.user
    );
    Ok(())
}

// ============================================================================
// AGGREGATION RUN
// ============================================================================

/// Aggregate the latest fetched statement file of every configured server.
///
/// The run timestamp is captured once per document so all rows of one fetch
/// cycle share a time index.
pub fn aggregate<P: StatementParser>(cfg: &Config, parser: &P) -> Result<()> {
    let user_cfg = accounts::get_user_cfg(cfg)?;
    for (server, settings) in user_cfg.servers() {
        let user = settings
            .get(CFG_USER_LABEL)
            .with_context(|| format!("server {} has no {} setting", server, CFG_USER_LABEL))?;
        let path = cfg.stmt_file(server, user);
        info!("aggregating {}", path.display());
        let raw = fs::read(&path)
            .with_context(|| format!("reading statement file {}", path.display()))?;
        let document = parser
            .parse(&raw)
            .with_context(|| format!("parsing statement file {}", path.display()))?;
        let ctx = AccountContext::now(server, user.as_str());
        aggregate_document(&document, &ctx, cfg)?;
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
