// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-memory post-fetch filtering and set algebra.

use std::slice;
use std::vec;

use tierstore_tier::{FieldCondition, Fields};

/// An error from a [`QuerySet`] accessor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum QueryError {
    /// The query set holds no records.
    #[error("query set is empty")]
    Empty,

    /// The index is past the last record.
    #[error("index {index} is out of range for a query set of {len} records")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// The number of records in the set.
        len: usize,
    },
}

/// An ordered collection of records returned by a read.
///
/// Filtering keeps matching records unchanged. [`and`](Self::and) and
/// [`or`](Self::or) compare records by equality and never produce duplicates.
/// Order is stable for one evaluation but is not otherwise part of the
/// contract.
///
/// Accessors that pick a single record fail with a [`QueryError`] instead of
/// returning a default, so an unexpectedly empty result is never mistaken for
/// data.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tierstore::{FieldCondition, QuerySet};
///
/// let people = QuerySet::new(vec![json!({"age": 30}), json!({"age": 25})]);
/// let thirty = people.filter(&FieldCondition::exact("age", 30));
/// assert_eq!(thirty.get_all(), &[json!({"age": 30})]);
///
/// let none = thirty.filter(&FieldCondition::exact("age", 99));
/// assert!(none.first().is_err());
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySet<V> {
    records: Vec<V>,
}

impl<V> Default for QuerySet<V> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<V> QuerySet<V> {
    /// Wraps `records` in their current order.
    #[must_use]
    pub fn new(records: Vec<V>) -> Self {
        Self { records }
    }

    /// Creates a query set with no records.
    #[must_use]
    pub fn empty() -> Self {
        Self { records: Vec::new() }
    }

    /// Keeps the records that satisfy `condition`.
    #[must_use]
    pub fn filter(self, condition: &FieldCondition) -> Self
    where
        V: Fields,
    {
        let records = self.records.into_iter().filter(|record| condition.matches(record)).collect();
        Self { records }
    }

    /// Returns the first record.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Empty`] if there are no records.
    pub fn first(&self) -> Result<&V, QueryError> {
        self.records.first().ok_or(QueryError::Empty)
    }

    /// Returns the last record.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Empty`] if there are no records.
    pub fn last(&self) -> Result<&V, QueryError> {
        self.records.last().ok_or(QueryError::Empty)
    }

    /// Returns the record at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Empty`] if there are no records and
    /// [`QueryError::IndexOutOfRange`] if `index` is past the last one.
    pub fn get_by_index(&self, index: usize) -> Result<&V, QueryError> {
        if self.records.is_empty() {
            return Err(QueryError::Empty);
        }
        self.records.get(index).ok_or(QueryError::IndexOutOfRange {
            index,
            len: self.records.len(),
        })
    }

    /// Returns every record.
    #[must_use]
    pub fn get_all(&self) -> &[V] {
        &self.records
    }

    /// Returns the number of records.
    #[must_use]
    pub fn count(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over the records.
    pub fn iter(&self) -> slice::Iter<'_, V> {
        self.records.iter()
    }

    /// Consumes the set and returns its records.
    #[must_use]
    pub fn into_vec(self) -> Vec<V> {
        self.records
    }
}

impl<V: PartialEq> QuerySet<V> {
    /// Keeps the records that also appear in `other`, without duplicates.
    #[must_use]
    pub fn and(self, other: &Self) -> Self {
        let mut records = Vec::new();
        for record in self.records {
            if other.records.contains(&record) && !records.contains(&record) {
                records.push(record);
            }
        }
        Self { records }
    }

    /// Combines the records of both sets, without duplicates.
    #[must_use]
    pub fn or(self, other: &Self) -> Self
    where
        V: Clone,
    {
        let mut records: Vec<V> = Vec::with_capacity(self.records.len() + other.records.len());
        for record in self.records.into_iter().chain(other.records.iter().cloned()) {
            if !records.contains(&record) {
                records.push(record);
            }
        }
        Self { records }
    }
}

impl<V> From<Vec<V>> for QuerySet<V> {
    fn from(records: Vec<V>) -> Self {
        Self::new(records)
    }
}

impl<V> FromIterator<V> for QuerySet<V> {
    fn from_iter<I: IntoIterator<Item = V>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<V> IntoIterator for QuerySet<V> {
    type Item = V;
    type IntoIter = vec::IntoIter<V>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, V> IntoIterator for &'a QuerySet<V> {
    type Item = &'a V;
    type IntoIter = slice::Iter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
