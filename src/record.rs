// Flat records - one row of named scalar fields destined for a table

use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexMap;
use std::fmt;

// ============================================================================
// SCALAR VALUES
// ============================================================================

/// Coerced field value inside a flat record.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Text(String),
    /// Normalized to UTC during flattening
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
}

impl Scalar {
    /// CSV cell representation. Timestamps keep their +00:00 suffix so table
    /// files stay unambiguous when read back.
    pub fn to_csv_field(&self) -> String {
        match self {
            Scalar::Number(n) => format!("{}", n),
            Scalar::Text(s) => s.clone(),
            Scalar::Timestamp(dt) => dt.format("%Y-%m-%d %H:%M:%S%:z").to_string(),
            Scalar::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_csv_field())
    }
}

// ============================================================================
// RECORD
// ============================================================================

/// Flat field name -> scalar mapping with insertion-ordered fields.
///
/// Field order matters: table columns accumulate in first-observed order, so
/// records remember the order in which fields were assigned.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: IndexMap<String, Scalar>,
}

impl Record {
    pub fn new() -> Self {
        Record {
            fields: IndexMap::new(),
        }
    }

    /// Assign a field. Callers that must not overwrite check `contains_key`
    /// first (the flattener's duplicate-key rule).
    pub fn insert(&mut self, name: impl Into<String>, value: Scalar) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Scalar)> {
        self.fields.iter()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        write!(f, "{{")?;
        for (name, value) in &self.fields {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
            first = false;
        }
        write!(f, "}}")
    }
}

// ============================================================================
// ACCOUNT CONTEXT
// ============================================================================

/// Per-run seed for every record produced from one fetched document.
///
/// Captured once per aggregation run so all rows of the run share the same
/// time index. The per-statement `acctid` extension happens on the flattened
/// account record, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountContext {
    pub datetime: DateTime<Utc>,
    pub date: NaiveDate,
    pub server: String,
    pub user: String,
}

impl AccountContext {
    /// Context stamped with the current UTC time.
    pub fn now(server: impl Into<String>, user: impl Into<String>) -> Self {
        Self::at(Utc::now(), server, user)
    }

    /// Context stamped with an explicit run time (tests, replays).
    pub fn at(
        datetime: DateTime<Utc>,
        server: impl Into<String>,
        user: impl Into<String>,
    ) -> Self {
        AccountContext {
            datetime,
            date: datetime.date_naive(),
            server: server.into(),
            user: user.into(),
        }
    }

    /// Seed record: `{datetime, date, server, user}` in that field order.
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("datetime", Scalar::Timestamp(self.datetime));
        record.insert("date", Scalar::Date(self.date));
        record.insert("server", Scalar::Text(self.server.clone()));
        record.insert("user", Scalar::Text(self.user.clone()));
        record
    }
}
