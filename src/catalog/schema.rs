// Schema Module
//
// Fixed-width tuple descriptions. Every tuple of a table occupies exactly
// `tuple_width()` bytes inside a page slot.

use std::fmt;
use std::str::FromStr;

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

use super::error::SchemaError;
use super::tuple::{Field, Tuple};

/// Default width reserved for text fields
pub const DEFAULT_TEXT_LEN: usize = 128;

/// Longest text field the u32 length prefix can describe
pub const MAX_TEXT_LEN: usize = u32::MAX as usize;

const INT_WIDTH: usize = 4;
const TEXT_LEN_PREFIX: usize = 4;

/// Data types supported by the page format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    /// 32-bit signed integer
    Int,
    /// UTF-8 text of at most the given number of bytes
    Text(usize),
}

impl FieldType {
    /// Number of bytes this type occupies in a slot
    pub fn width(&self) -> usize {
        match self {
            FieldType::Int => INT_WIDTH,
            FieldType::Text(max_len) => TEXT_LEN_PREFIX.saturating_add(*max_len),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int => write!(f, "INT"),
            FieldType::Text(len) => write!(f, "TEXT({})", len),
        }
    }
}

impl FromStr for FieldType {
    type Err = SchemaError;

    /// Parses `int`, `text` or `text:<len>`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.split_once(':') {
            None if lower == "int" => Ok(FieldType::Int),
            None if lower == "text" => Ok(FieldType::Text(DEFAULT_TEXT_LEN)),
            Some(("text", len)) => match len.parse::<usize>() {
                Ok(len) if len <= MAX_TEXT_LEN => Ok(FieldType::Text(len)),
                _ => Err(SchemaError::InvalidSpec(s.to_string())),
            },
            _ => Err(SchemaError::InvalidSpec(s.to_string())),
        }
    }
}

/// A named column of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    field_type: FieldType,
}

impl Column {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_type(&self) -> FieldType {
        self.field_type
    }
}

/// Ordered column list describing the tuples of one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Schema with generated column names (`f0`, `f1`, ...)
    pub fn from_types(types: &[FieldType]) -> Self {
        let columns = types
            .iter()
            .enumerate()
            .map(|(i, t)| Column::new(format!("f{}", i), *t))
            .collect();
        Self { columns }
    }

    /// Parses a comma separated list such as `int,int,text:16`
    pub fn parse(spec: &str) -> Result<Self, SchemaError> {
        let types = spec
            .split(',')
            .map(FieldType::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_types(&types))
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Width of one encoded tuple in bytes, saturating at `usize::MAX`
    pub fn tuple_width(&self) -> usize {
        self.columns
            .iter()
            .fold(0usize, |width, c| width.saturating_add(c.field_type.width()))
    }

    /// Check that a tuple can be stored under this schema
    pub fn validate(&self, tuple: &Tuple) -> Result<(), SchemaError> {
        let values = tuple.values();
        if values.len() != self.columns.len() {
            return Err(SchemaError::ArityMismatch {
                expected: self.columns.len(),
                actual: values.len(),
            });
        }

        for (column, value) in self.columns.iter().zip(values) {
            match (column.field_type, value) {
                (FieldType::Int, Field::Int(_)) => {}
                (FieldType::Text(max), Field::Text(s)) => {
                    if s.len() > max {
                        return Err(SchemaError::TextTooLong {
                            field: column.name.clone(),
                            len: s.len(),
                            max,
                        });
                    }
                }
                (expected, actual) => {
                    return Err(SchemaError::TypeMismatch {
                        field: column.name.clone(),
                        expected: expected.to_string(),
                        actual: actual.type_name().to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Encode a tuple into `buf`, which must be exactly `tuple_width()` bytes
    pub fn encode(&self, tuple: &Tuple, buf: &mut [u8]) -> Result<(), SchemaError> {
        self.validate(tuple)?;
        debug_assert_eq!(buf.len(), self.tuple_width());

        let mut offset = 0;
        for (column, value) in self.columns.iter().zip(tuple.values()) {
            let width = column.field_type.width();
            let out = &mut buf[offset..offset + width];
            match value {
                Field::Int(v) => LittleEndian::write_i32(out, *v),
                Field::Text(s) => {
                    LittleEndian::write_u32(&mut out[..TEXT_LEN_PREFIX], s.len() as u32);
                    let body = &mut out[TEXT_LEN_PREFIX..];
                    body[..s.len()].copy_from_slice(s.as_bytes());
                    body[s.len()..].fill(0);
                }
            }
            offset += width;
        }
        Ok(())
    }

    /// Decode one tuple from `buf`
    pub fn decode(&self, buf: &[u8]) -> Result<Tuple, SchemaError> {
        if buf.len() < self.tuple_width() {
            return Err(SchemaError::Corrupted(format!(
                "expected {} bytes, got {}",
                self.tuple_width(),
                buf.len()
            )));
        }

        let mut values = Vec::with_capacity(self.columns.len());
        let mut offset = 0;
        for column in &self.columns {
            let width = column.field_type.width();
            let raw = &buf[offset..offset + width];
            let value = match column.field_type {
                FieldType::Int => Field::Int(LittleEndian::read_i32(raw)),
                FieldType::Text(max) => {
                    let len = LittleEndian::read_u32(&raw[..TEXT_LEN_PREFIX]) as usize;
                    if len > max {
                        return Err(SchemaError::Corrupted(format!(
                            "text length {} exceeds width {} in field {}",
                            len, max, column.name
                        )));
                    }
                    let text = std::str::from_utf8(&raw[TEXT_LEN_PREFIX..TEXT_LEN_PREFIX + len])
                        .map_err(|e| SchemaError::Corrupted(e.to_string()))?;
                    Field::Text(text.to_string())
                }
            };
            values.push(value);
            offset += width;
        }
        Ok(Tuple::new(values))
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.field_type))
            .collect();
        write!(f, "({})", parts.join(", "))
    }
}
