//! Query vocabulary shared by every driver: filters, find options and cursors.

use std::cmp::Ordering;
use std::collections::VecDeque;

use orchstate_core::{RawDocument, Value};

/// A comparison applied to one top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Field equals the value. A missing field equals `Null`.
    Eq(Value),
    /// Field differs from the value.
    Ne(Value),
    /// Field equals one of the values.
    In(Vec<Value>),
    /// Field is strictly less than the value.
    Lt(Value),
    /// Field is less than or equal to the value.
    Lte(Value),
    /// Field is strictly greater than the value.
    Gt(Value),
    /// Field is greater than or equal to the value.
    Gte(Value),
    /// Field is a list holding the value.
    Contains(Value),
}

/// A single field condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    /// Top-level field name.
    pub field: String,
    /// Comparison to apply.
    pub op: Op,
}

impl Condition {
    fn matches(&self, document: &RawDocument) -> bool {
        let actual = document.get(&self.field).unwrap_or(&Value::Null);
        let ordered = |expected: &Value, accept: fn(Ordering) -> bool| {
            actual.compare(expected).is_some_and(accept)
        };
        match &self.op {
            Op::Eq(expected) => actual == expected,
            Op::Ne(expected) => actual != expected,
            Op::In(candidates) => candidates.iter().any(|c| c == actual),
            Op::Lt(expected) => ordered(expected, Ordering::is_lt),
            Op::Lte(expected) => ordered(expected, Ordering::is_le),
            Op::Gt(expected) => ordered(expected, Ordering::is_gt),
            Op::Gte(expected) => ordered(expected, Ordering::is_ge),
            Op::Contains(expected) => actual
                .as_list()
                .is_some_and(|items| items.iter().any(|item| item == expected)),
        }
    }
}

/// A conjunction of field conditions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    /// Create a filter that matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an arbitrary condition.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, op: Op) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            op,
        });
        self
    }

    /// Require `field == value`.
    #[must_use]
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Eq(value.into()))
    }

    /// Require `field` to be one of `values`.
    #[must_use]
    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.with(field, Op::In(values.into_iter().map(Into::into).collect()))
    }

    /// Require `field < value`.
    #[must_use]
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Lt(value.into()))
    }

    /// Require `field > value`.
    #[must_use]
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Gt(value.into()))
    }

    /// Require the list in `field` to contain `value`.
    #[must_use]
    pub fn contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with(field, Op::Contains(value.into()))
    }

    /// The conditions of this filter.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// Rewrite every condition value, e.g. to lower typed values to their stored form.
    #[must_use]
    pub fn map_values(self, f: impl Fn(&str, Value) -> Value) -> Self {
        let conditions = self
            .conditions
            .into_iter()
            .map(|Condition { field, op }| {
                let op = match op {
                    Op::Eq(v) => Op::Eq(f(&field, v)),
                    Op::Ne(v) => Op::Ne(f(&field, v)),
                    Op::In(vs) => Op::In(vs.into_iter().map(|v| f(&field, v)).collect()),
                    Op::Lt(v) => Op::Lt(f(&field, v)),
                    Op::Lte(v) => Op::Lte(f(&field, v)),
                    Op::Gt(v) => Op::Gt(f(&field, v)),
                    Op::Gte(v) => Op::Gte(f(&field, v)),
                    Op::Contains(v) => Op::Contains(f(&field, v)),
                };
                Condition { field, op }
            })
            .collect();
        Self { conditions }
    }

    /// Rename the field of every condition on `from` to `to`.
    #[must_use]
    pub fn rename_field(mut self, from: &str, to: &str) -> Self {
        for condition in &mut self.conditions {
            if condition.field == from {
                condition.field = to.to_string();
            }
        }
        self
    }

    /// Returns true if `document` satisfies every condition.
    #[must_use]
    pub fn matches(&self, document: &RawDocument) -> bool {
        self.conditions.iter().all(|c| c.matches(document))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Sorting and paging applied to a find.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    /// Sort keys, most significant first.
    pub sort: Vec<(String, SortOrder)>,
    /// Number of matching documents to skip.
    pub skip: usize,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Add a sort key.
    #[must_use]
    pub fn sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((field.into(), order));
        self
    }

    /// Skip the first `skip` matches.
    #[must_use]
    pub const fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Return at most `limit` matches.
    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort, skip and limit an already filtered result set.
    #[must_use]
    pub fn apply(&self, mut documents: Vec<RawDocument>) -> Vec<RawDocument> {
        if !self.sort.is_empty() {
            documents.sort_by(|a, b| {
                for (field, order) in &self.sort {
                    let left = a.get(field).unwrap_or(&Value::Null);
                    let right = b.get(field).unwrap_or(&Value::Null);
                    let ordering = left.compare(right).unwrap_or(Ordering::Equal);
                    let ordering = match order {
                        SortOrder::Ascending => ordering,
                        SortOrder::Descending => ordering.reverse(),
                    };
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                Ordering::Equal
            });
        }

        let remaining = documents.into_iter().skip(self.skip);
        match self.limit {
            Some(limit) => remaining.take(limit).collect(),
            None => remaining.collect(),
        }
    }
}

/// A finite, forward-only sequence of documents produced by a find.
///
/// Both drivers materialize the matching set before the cursor is returned;
/// only the hand-out through [`Cursor::to_list`] is incremental.
#[derive(Debug, Default)]
pub struct Cursor {
    documents: VecDeque<RawDocument>,
}

impl Cursor {
    /// Wrap an already materialized result set.
    #[must_use]
    pub fn new(documents: Vec<RawDocument>) -> Self {
        Self {
            documents: documents.into(),
        }
    }

    /// Take up to `length` documents from the cursor.
    #[must_use]
    pub fn to_list(mut self, length: usize) -> Vec<RawDocument> {
        let take = length.min(self.documents.len());
        self.documents.drain(..take).collect()
    }

    /// Number of documents not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.documents.len()
    }
}

impl Iterator for Cursor {
    type Item = RawDocument;

    fn next(&mut self) -> Option<Self::Item> {
        self.documents.pop_front()
    }
}
