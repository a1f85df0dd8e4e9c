// Statement document model - the tree handed over by the statement parser
//
// The parser collaborator deserializes raw OFX text into this closed set of
// node variants. The pipeline never introspects parser internals: a node is
// either a Composite with an explicit ordered list of named children, or a
// Leaf holding one scalar value.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

// ============================================================================
// LEAF VALUES
// ============================================================================

/// Scalar payload of a terminal tree node.
///
/// `Bool` occurs in source documents (Y/N elements) but has no defined
/// coercion into table records; flattening one is an error.
#[derive(Debug, Clone, PartialEq)]
pub enum LeafValue {
    /// Exact decimal amount as parsed from the document
    Decimal(Decimal),
    /// Free-form or enumerated text
    Text(String),
    /// Timestamp with whatever offset the document carried
    Timestamp(DateTime<FixedOffset>),
    /// Y/N flag
    Bool(bool),
    /// Element present in the schema but absent in the document
    None,
}

impl LeafValue {
    /// Human-readable type name, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            LeafValue::Decimal(_) => "decimal",
            LeafValue::Text(_) => "text",
            LeafValue::Timestamp(_) => "timestamp",
            LeafValue::Bool(_) => "bool",
            LeafValue::None => "none",
        }
    }
}

// ============================================================================
// STATEMENT NODES
// ============================================================================

/// One node of the parsed statement tree.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementNode {
    /// Named children in document order. Child names repeat only across
    /// different composites, never within one (OFX element uniqueness).
    Composite(Vec<(String, StatementNode)>),
    /// Terminal scalar
    Leaf(LeafValue),
}

impl StatementNode {
    /// Composite from (name, node) pairs; convenience for parsers and tests.
    pub fn composite<I, S>(children: I) -> Self
    where
        I: IntoIterator<Item = (S, StatementNode)>,
        S: Into<String>,
    {
        StatementNode::Composite(
            children
                .into_iter()
                .map(|(name, node)| (name.into(), node))
                .collect(),
        )
    }

    /// Decimal leaf.
    pub fn decimal(value: Decimal) -> Self {
        StatementNode::Leaf(LeafValue::Decimal(value))
    }

    /// Text leaf.
    pub fn text(value: impl Into<String>) -> Self {
        StatementNode::Leaf(LeafValue::Text(value.into()))
    }

    /// Timestamp leaf.
    pub fn timestamp(value: DateTime<FixedOffset>) -> Self {
        StatementNode::Leaf(LeafValue::Timestamp(value))
    }

    /// Absent element.
    pub fn none() -> Self {
        StatementNode::Leaf(LeafValue::None)
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, StatementNode::Composite(_))
    }
}

// ============================================================================
// DOCUMENT STRUCTURE
// ============================================================================

/// One fetched document: every statement of one (server, user) pair plus the
/// document-level securities list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub statements: Vec<Statement>,
    /// Security definitions referenced by positions; not account-scoped
    pub securities: Vec<StatementNode>,
}

/// One account's activity and position snapshot inside a document.
///
/// Sub-collections are always sequences (possibly empty); the account and
/// balances sub-nodes are always single composites.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub account: StatementNode,
    pub transactions: Vec<StatementNode>,
    pub positions: Vec<StatementNode>,
    pub balances: Balances,
}

/// Balances wrapper; only the inner balance list is tabulated.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Balances {
    pub ballist: Vec<StatementNode>,
}
