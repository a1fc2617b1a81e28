//! Query shapes accepted by attribute indexes.
//!
//! [`Query`] is a closed set of shapes. An index declares the subset it serves
//! through its [`Capabilities`](crate::Capabilities); any other shape is rejected
//! with `ErrorKind::UnsupportedQuery`, which tells the planner to pick another
//! index for that predicate.

use std::fmt;

use ahash::AHashMap;

use crate::Attribute;

/// A predicate over one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Query<V> {
    /// Attribute has exactly `value`.
    Equal { attribute: String, value: V },

    /// Attribute has at least one non-null value.
    Has { attribute: String },

    /// Attribute has any of `values`.
    In { attribute: String, values: Vec<V> },

    LessThan {
        attribute: String,
        value: V,
        inclusive: bool,
    },

    GreaterThan {
        attribute: String,
        value: V,
        inclusive: bool,
    },

    Between {
        attribute: String,
        lower: V,
        lower_inclusive: bool,
        upper: V,
        upper_inclusive: bool,
    },
}

/// The shape of a [`Query`], without its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Equal,
    Has,
    In,
    LessThan,
    GreaterThan,
    Between,
}

impl<V> Query<V> {
    pub fn equal<O>(attribute: &impl Attribute<O, Value = V>, value: V) -> Query<V> {
        Query::Equal {
            attribute: attribute.name().to_string(),
            value,
        }
    }

    pub fn has<O>(attribute: &impl Attribute<O, Value = V>) -> Query<V> {
        Query::Has {
            attribute: attribute.name().to_string(),
        }
    }

    pub fn in_values<O>(attribute: &impl Attribute<O, Value = V>, values: Vec<V>) -> Query<V> {
        Query::In {
            attribute: attribute.name().to_string(),
            values,
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Equal { .. } => QueryKind::Equal,
            Query::Has { .. } => QueryKind::Has,
            Query::In { .. } => QueryKind::In,
            Query::LessThan { .. } => QueryKind::LessThan,
            Query::GreaterThan { .. } => QueryKind::GreaterThan,
            Query::Between { .. } => QueryKind::Between,
        }
    }

    /// Name of the attribute this query constrains.
    pub fn attribute_name(&self) -> &str {
        match self {
            Query::Equal { attribute, .. }
            | Query::Has { attribute }
            | Query::In { attribute, .. }
            | Query::LessThan { attribute, .. }
            | Query::GreaterThan { attribute, .. }
            | Query::Between { attribute, .. } => attribute,
        }
    }
}

impl<V: PartialOrd> Query<V> {
    /// Evaluates the query against the live values of `object`.
    ///
    /// This never consults an index, so it is the reference semantics that
    /// index results must agree with.
    pub fn matches<O>(&self, attribute: &impl Attribute<O, Value = V>, object: &O) -> bool {
        let values = attribute.values(object);
        let mut present = values.iter().flatten();
        match self {
            Query::Equal { value, .. } => present.any(|v| v == value),
            Query::Has { .. } => present.next().is_some(),
            Query::In { values, .. } => present.any(|v| values.contains(v)),
            Query::LessThan {
                value, inclusive, ..
            } => present.any(|v| v < value || (*inclusive && v == value)),
            Query::GreaterThan {
                value, inclusive, ..
            } => present.any(|v| v > value || (*inclusive && v == value)),
            Query::Between {
                lower,
                lower_inclusive,
                upper,
                upper_inclusive,
                ..
            } => present.any(|v| {
                (v > lower || (*lower_inclusive && v == lower))
                    && (v < upper || (*upper_inclusive && v == upper))
            }),
        }
    }
}

impl<V: fmt::Debug> fmt::Display for Query<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Equal { attribute, value } => write!(f, "equal({attribute}, {value:?})"),
            Query::Has { attribute } => write!(f, "has({attribute})"),
            Query::In { attribute, values } => write!(f, "in({attribute}, {values:?})"),
            Query::LessThan {
                attribute,
                value,
                inclusive,
            } => {
                let op = if *inclusive { "lessThanOrEqualTo" } else { "lessThan" };
                write!(f, "{op}({attribute}, {value:?})")
            }
            Query::GreaterThan {
                attribute,
                value,
                inclusive,
            } => {
                let op = if *inclusive {
                    "greaterThanOrEqualTo"
                } else {
                    "greaterThan"
                };
                write!(f, "{op}({attribute}, {value:?})")
            }
            Query::Between {
                attribute,
                lower,
                lower_inclusive,
                upper,
                upper_inclusive,
            } => write!(
                f,
                "between({attribute}, {lower:?}, {lower_inclusive}, {upper:?}, {upper_inclusive})"
            ),
        }
    }
}

/// Caller-supplied options that travel with a query into its result set.
///
/// Indexes do not interpret options themselves; they are carried for the host
/// engine's benefit.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    values: AHashMap<String, String>,
}

impl QueryOptions {
    pub fn new() -> QueryOptions {
        Default::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> QueryOptions {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
