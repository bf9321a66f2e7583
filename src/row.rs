//! Row representations for each stage of the pipeline.
//!
//! A row starts as a [`MappedRow`] (destination field names, raw strings),
//! becomes a [`CastRow`] once values are typed, and ends as a [`SqlRow`] of
//! rendered SQL literals in the schema's column order.

use chrono::{NaiveDateTime, NaiveTime};
use std::collections::HashMap;

/// Destination field name to raw source value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedRow {
    fields: HashMap<String, String>,
}

impl MappedRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.fields.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MappedRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// A typed destination value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Float(f64),
    Int(i64),
    Date(NaiveDateTime),
    Time(NaiveTime),
    /// A projected point in the destination spatial reference.
    Point { x: f64, y: f64 },
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Destination field name to typed value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CastRow {
    fields: HashMap<String, Value>,
}

impl CastRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing fields read as `Null`.
    pub fn get(&self, field: &str) -> &Value {
        self.fields.get(field).unwrap_or(&Value::Null)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn text(&self, field: &str) -> Option<&str> {
        self.get(field).as_str()
    }

    pub fn float(&self, field: &str) -> Option<f64> {
        self.get(field).as_f64()
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for CastRow {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

/// Values in schema column order, after `reorder_filter`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedRow(pub Vec<Value>);

/// Rendered SQL literals, one per destination column.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlRow(pub Vec<String>);

impl SqlRow {
    pub fn values(&self) -> &[String] {
        &self.0
    }

    pub fn joined(&self) -> String {
        self.0.join(",")
    }
}
