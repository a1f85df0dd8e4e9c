// Model flattening - statement tree -> flat table records
//
// Walks a StatementNode tree and accumulates every leaf into one record,
// keyed by the leaf's attribute name. Each record starts as a copy of the
// caller's seed (account context or flattened account record).

use crate::model::{LeafValue, StatementNode};
use crate::record::{Record, Scalar};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use std::fmt;

// ============================================================================
// STRUCTURAL DENYLIST
// ============================================================================

/// Bookkeeping attributes the statement parser attaches to every composite
/// (source tag name, input line, raw text). Structural, not financial
/// content; never flattened into records.
pub const STRUCTURAL_ATTRS: &[&str] = &["tag", "line", "raw"];

/// Ordered attributes of a composite that the traversal recurses into:
/// everything except structural bookkeeping and private-marker names.
pub fn attributes_of<'a>(
    children: &'a [(String, StatementNode)],
) -> impl Iterator<Item = (&'a str, &'a StatementNode)> {
    children
        .iter()
        .filter(|(name, _)| !name.starts_with('_') && !STRUCTURAL_ATTRS.contains(&name.as_str()))
        .map(|(name, node)| (name.as_str(), node))
}

// ============================================================================
// ERRORS
// ============================================================================

/// Unrecoverable flattening failures. Both abort the record under
/// construction; no partial record is handed to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum FlattenError {
    /// Two subtree paths resolved to the same flat field name. The record
    /// snapshot shows what was already assigned when the collision hit.
    DuplicateField { key: String, record: Record },
    /// Leaf type with no defined coercion (e.g. a Y/N flag)
    UnsupportedLeaf { key: String, type_name: &'static str },
}

impl fmt::Display for FlattenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenError::DuplicateField { key, record } => {
                write!(f, "key ({}) already in record {}", key, record)
            }
            FlattenError::UnsupportedLeaf { key, type_name } => {
                write!(f, "unsupported leaf type ({}) for key ({})", type_name, key)
            }
        }
    }
}

impl Error for FlattenError {}

// ============================================================================
// MODEL INPUT
// ============================================================================

/// Flattening input: one composite or an explicit sequence of composites.
///
/// Replaces the upstream "probe the container length" idiom with a
/// discriminated type. An empty sequence yields zero records; a single node
/// always yields exactly one.
#[derive(Debug, Clone, Copy)]
pub enum Models<'a> {
    Single(&'a StatementNode),
    Seq(&'a [StatementNode]),
}

// ============================================================================
// FLATTENING
// ============================================================================

/// Recursively flatten `node` into `record` under `key`.
///
/// Composites recurse into each non-structural attribute; leaves coerce into
/// the record: decimal -> f64, text -> copy, timestamp -> UTC, absent -> no
/// assignment. A key already present in the record is a `DuplicateField`
/// error (repeated field names across sibling subtrees are unsupported).
pub fn flatten_into(node: &StatementNode, record: &mut Record, key: &str) -> Result<(), FlattenError> {
    match node {
        StatementNode::Composite(children) => {
            for (name, child) in attributes_of(children) {
                flatten_into(child, record, name)?;
            }
            Ok(())
        }
        StatementNode::Leaf(value) => coerce_into(value, record, key),
    }
}

fn coerce_into(value: &LeafValue, record: &mut Record, key: &str) -> Result<(), FlattenError> {
    // Absent elements assign nothing and skip the duplicate check
    if matches!(value, LeafValue::None) {
        return Ok(());
    }
    if record.contains_key(key) {
        return Err(FlattenError::DuplicateField {
            key: key.to_string(),
            record: record.clone(),
        });
    }
    let scalar = match value {
        LeafValue::Decimal(d) => {
            match d.to_f64() {
                Some(n) => Scalar::Number(n),
                None => {
                    return Err(FlattenError::UnsupportedLeaf {
                        key: key.to_string(),
                        type_name: "decimal",
                    })
                }
            }
        }
        LeafValue::Text(s) => Scalar::Text(s.clone()),
        LeafValue::Timestamp(dt) => Scalar::Timestamp(dt.with_timezone(&Utc)),
        LeafValue::Bool(_) => {
            return Err(FlattenError::UnsupportedLeaf {
                key: key.to_string(),
                type_name: "bool",
            })
        }
        LeafValue::None => unreachable!("handled above"),
    };
    record.insert(key, scalar);
    Ok(())
}

/// One record = seed copy + flattened attributes of `node`.
///
/// On error the partially built record is dropped here; callers only ever
/// see complete records.
pub fn record_from_model(node: &StatementNode, seed: &Record) -> Result<Record, FlattenError> {
    let mut record = seed.clone();
    if let StatementNode::Composite(children) = node {
        for (name, child) in attributes_of(children) {
            flatten_into(child, &mut record, name)?;
        }
    }
    Ok(record)
}

/// Records for a single node or a sequence of nodes, each seeded with a copy
/// of `seed`.
pub fn records_from_model(models: Models<'_>, seed: &Record) -> Result<Vec<Record>, FlattenError> {
    match models {
        Models::Single(node) => Ok(vec![record_from_model(node, seed)?]),
        Models::Seq(nodes) => nodes
            .iter()
            .map(|node| record_from_model(node, seed))
            .collect(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
