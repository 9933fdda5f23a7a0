use std::fmt;

use crate::common::types::RecordId;

/// A single field value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Text(String),
}

impl Field {
    pub fn type_name(&self) -> &'static str {
        match self {
            Field::Int(_) => "INT",
            Field::Text(_) => "TEXT",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Text(s) => write!(f, "'{}'", s),
        }
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Text(s.to_string())
    }
}

/// A fixed-width record. Tuples read from a page carry the `RecordId` they were read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    values: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(values: Vec<Field>) -> Self {
        Self {
            values,
            record_id: None,
        }
    }

    /// Convenience constructor for all-integer tuples
    pub fn from_ints(values: &[i32]) -> Self {
        Self::new(values.iter().copied().map(Field::Int).collect())
    }

    pub fn values(&self) -> &[Field] {
        &self.values
    }

    pub fn value(&self, index: usize) -> Option<&Field> {
        self.values.get(index)
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, rid: Option<RecordId>) {
        self.record_id = rid;
    }

    pub fn with_record_id(mut self, rid: RecordId) -> Self {
        self.record_id = Some(rid);
        self
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        write!(f, "({})", parts.join(", "))
    }
}
