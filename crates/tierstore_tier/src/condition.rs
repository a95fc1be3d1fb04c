// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Field conditions evaluated against records.
//!
//! A [`FieldCondition`] tests one field of a record. The same rules apply to
//! every tier that evaluates conditions in process:
//!
//! - `Exact` compares for equality. Integers and floats compare numerically.
//! - `Range` only applies to numeric and date/time fields and is inclusive at
//!   both ends. Fields of any other type are excluded.
//! - `Like` only applies to text fields and is a case-sensitive substring test.
//! - A record without the field never matches.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A scalar field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// An explicit null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Integer(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
    /// A UTC timestamp.
    Time(DateTime<Utc>),
}

impl FieldValue {
    #[expect(clippy::cast_precision_loss, reason = "mixed int/float comparisons go through f64")]
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the timestamp this value denotes, parsing RFC 3339 text.
    #[must_use]
    pub fn as_time(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            Self::Text(s) => DateTime::parse_from_rfc3339(s).ok().map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Returns `true` for integer and float values.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Float(_))
    }

    /// Compares two numeric values, or two values that both denote a time.
    ///
    /// Returns `None` when the values are not comparable.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (a, b) if a.is_numeric() && b.is_numeric() => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Self::Time(_), _) | (_, Self::Time(_)) => Some(self.as_time()?.cmp(&other.as_time()?)),
            _ => None,
        }
    }

    fn loosely_equals(&self, other: &Self) -> bool {
        match (self, other) {
            (a, b) if a.is_numeric() && b.is_numeric() => a.compare(b) == Some(Ordering::Equal),
            (Self::Time(_), _) | (_, Self::Time(_)) => self.compare(other) == Some(Ordering::Equal),
            (a, b) => a == b,
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Time(value)
    }
}

impl FieldValue {
    /// Converts a scalar JSON value. Arrays and objects have no field value.
    #[must_use]
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Self::Integer).or_else(|| n.as_f64().map(Self::Float)),
            Value::String(s) => Some(Self::Text(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Converts this value to JSON. Times become RFC 3339 strings.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Text(s) => Value::String(s.clone()),
            Self::Time(t) => Value::String(t.to_rfc3339()),
        }
    }
}

/// Read access to the named fields of a record.
///
/// Implemented for JSON objects; implement it for your own record types to
/// filter them in memory.
pub trait Fields {
    /// Returns the value of `name`, or `None` if the record has no such field.
    fn field(&self, name: &str) -> Option<FieldValue>;
}

impl Fields for Map<String, Value> {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.get(name).and_then(FieldValue::from_json)
    }
}

impl Fields for Value {
    fn field(&self, name: &str) -> Option<FieldValue> {
        self.as_object().and_then(|object| object.field(name))
    }
}

impl<T: Fields + ?Sized> Fields for &T {
    fn field(&self, name: &str) -> Option<FieldValue> {
        (**self).field(name)
    }
}

/// How a [`FieldCondition`] tests its field.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// The field equals the value.
    Exact(FieldValue),
    /// The field lies within `[min, max]`.
    Range {
        /// Inclusive lower bound.
        min: FieldValue,
        /// Inclusive upper bound.
        max: FieldValue,
    },
    /// The text field contains the pattern.
    Like(String),
}

/// A test applied to one field of a record.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tierstore_tier::FieldCondition;
///
/// let record = json!({"name": "Alice", "age": 30});
/// assert!(FieldCondition::exact("age", 30).matches(&record));
/// assert!(FieldCondition::range("age", 20, 30).matches(&record));
/// assert!(FieldCondition::like("name", "Ali").matches(&record));
/// assert!(!FieldCondition::like("name", "ali").matches(&record));
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct FieldCondition {
    field: String,
    predicate: Predicate,
}

impl FieldCondition {
    /// Matches records whose `field` equals `value`.
    pub fn exact(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::Exact(value.into()),
        }
    }

    /// Matches records whose numeric or time `field` lies within `[min, max]`.
    pub fn range(field: impl Into<String>, min: impl Into<FieldValue>, max: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::Range {
                min: min.into(),
                max: max.into(),
            },
        }
    }

    /// Matches records whose text `field` contains `pattern`.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::Like(pattern.into()),
        }
    }

    /// Returns the field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the predicate.
    #[must_use]
    pub const fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Tests `record` against this condition.
    pub fn matches<R: Fields + ?Sized>(&self, record: &R) -> bool {
        let Some(value) = record.field(&self.field) else {
            return false;
        };

        match &self.predicate {
            Predicate::Exact(expected) => value.loosely_equals(expected),
            Predicate::Range { min, max } => in_range(&value, min, max),
            Predicate::Like(pattern) => matches!(&value, FieldValue::Text(text) if text.contains(pattern.as_str())),
        }
    }
}

fn in_range(value: &FieldValue, min: &FieldValue, max: &FieldValue) -> bool {
    let numeric = min.is_numeric() && max.is_numeric() && value.is_numeric();
    let temporal = matches!(min, FieldValue::Time(_)) && matches!(max, FieldValue::Time(_)) && value.as_time().is_some();
    if !numeric && !temporal {
        return false;
    }

    matches!(value.compare(min), Some(Ordering::Greater | Ordering::Equal))
        && matches!(value.compare(max), Some(Ordering::Less | Ordering::Equal))
}
