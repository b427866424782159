//! Untyped row model of the table store.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Primary-key value. Integer keys sort before text keys; a table only
/// ever holds one kind.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Key {
    Int(i64),
    Text(String),
}

impl Key {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Key::Int(v) => Some(*v),
            Key::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Key::Text(v) => Some(v),
            Key::Int(_) => None,
        }
    }

    pub fn fits(&self, ty: ColumnType) -> bool {
        matches!(
            (self, ty),
            (Key::Int(_), ColumnType::Int | ColumnType::BigInt) | (Key::Text(_), ColumnType::Text)
        )
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Int(v) => write!(f, "{v}"),
            Key::Text(v) => write!(f, "{v}"),
        }
    }
}

/// Non-key cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn fits(&self, ty: ColumnType) -> bool {
        matches!(
            (self, ty),
            (Value::Int(_), ColumnType::Int | ColumnType::BigInt)
                | (Value::Float(_), ColumnType::Float)
                | (Value::Text(_), ColumnType::Text)
        )
    }
}

/// Column name to value, excluding the primary key.
pub type Record = BTreeMap<String, Value>;

/// Rows of one table keyed by primary key, ascending.
pub type Rows = BTreeMap<Key, Record>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    BigInt,
    Float,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub ty: ColumnType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Which non-key columns a query returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    /// Named columns only. An empty list returns keys with empty records.
    Columns(Vec<String>),
}

impl Projection {
    pub fn keys_only() -> Self {
        Projection::Columns(Vec::new())
    }

    pub fn includes(&self, column: &str) -> bool {
        match self {
            Projection::All => true,
            Projection::Columns(cols) => cols.iter().any(|c| c == column),
        }
    }
}

/// One comparison against the primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyBound {
    AtLeast(Key),
    AtMost(Key),
    Equals(Key),
}

impl KeyBound {
    fn matches(&self, key: &Key) -> bool {
        match self {
            KeyBound::AtLeast(bound) => key >= bound,
            KeyBound::AtMost(bound) => key <= bound,
            KeyBound::Equals(bound) => key == bound,
        }
    }
}

/// Conjunction of key bounds. The empty predicate matches every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    bounds: Vec<KeyBound>,
}

impl Predicate {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn key_equals(key: Key) -> Self {
        Self::all().and(KeyBound::Equals(key))
    }

    pub fn and(mut self, bound: KeyBound) -> Self {
        self.bounds.push(bound);
        self
    }

    pub fn bounds(&self) -> &[KeyBound] {
        &self.bounds
    }

    pub fn matches(&self, key: &Key) -> bool {
        self.bounds.iter().all(|b| b.matches(key))
    }

    /// The single key this predicate pins, if any `Equals` bound is present.
    pub fn pinned_key(&self) -> Option<&Key> {
        self.bounds.iter().find_map(|b| match b {
            KeyBound::Equals(k) => Some(k),
            _ => None,
        })
    }
}
