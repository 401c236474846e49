//! Query model
//!
//! Canonical [`Filter`]/[`Sort`]/[`Query`] values and the builder that
//! produces them from caller input ([`FindOptions`]).
//!
//! ## Operator spellings
//!
//! | Canonical | Accepted |
//! |-----------|----------|
//! | `Eq` | `=` `eq` |
//! | `Lt` | `<` `lt` |
//! | `Lte` | `<=` `lte` |
//! | `Gt` | `>` `gt` |
//! | `Gte` | `>=` `gte` |
//! | `Ne` | `!=` `not` |
//! | `In` | `contains?` `contains` `in?` `in` |
//!
//! ## Order spellings
//!
//! `asc`/`ascending` and `desc`/`descending`.
//!
//! Anything else is a `Schema` error raised while building, before any
//! backend is contacted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::format::format_kind;
use crate::schema::Schema;
use crate::traits::KeyCodec;
use crate::types::PackContext;
use crate::value::Value;

/// Canonical filter operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// Equality
    Eq,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Inequality
    Ne,
    /// Membership: the field value is in the filter collection
    In,
}

impl Operator {
    /// Resolve any accepted spelling
    pub fn parse(spelling: &str) -> Result<Self> {
        match spelling {
            "=" | "eq" => Ok(Operator::Eq),
            "<" | "lt" => Ok(Operator::Lt),
            "<=" | "lte" => Ok(Operator::Lte),
            ">" | "gt" => Ok(Operator::Gt),
            ">=" | "gte" => Ok(Operator::Gte),
            "!=" | "not" => Ok(Operator::Ne),
            "contains?" | "contains" | "in?" | "in" => Ok(Operator::In),
            other => Err(Error::schema(format!("unknown filter operator: '{}'", other))),
        }
    }

    /// Canonical spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Ne => "!=",
            Operator::In => "in",
        }
    }

    /// True for `<`, `<=`, `>`, `>=`
    pub fn is_range(&self) -> bool {
        matches!(
            self,
            Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte
        )
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Operator::parse(s)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Order {
    /// Smallest first
    Asc,
    /// Largest first
    Desc,
}

impl Order {
    /// Resolve any accepted spelling
    pub fn parse(spelling: &str) -> Result<Self> {
        match spelling {
            "asc" | "ascending" => Ok(Order::Asc),
            "desc" | "descending" => Ok(Order::Desc),
            other => Err(Error::schema(format!("unknown sort order: '{}'", other))),
        }
    }

    /// Canonical spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

impl FromStr for Order {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Order::parse(s)
    }
}

/// One compiled filter: storage field, operator, packed value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Storage field name
    pub field: String,
    /// Canonical operator
    pub operator: Operator,
    /// Value in storage representation
    pub value: Value,
}

impl Filter {
    /// Build a filter directly in canonical form
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// One compiled sort key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    /// Storage field name
    pub field: String,
    /// Direction
    pub order: Order,
}

impl Sort {
    /// Build a sort key directly in canonical form
    pub fn new(field: impl Into<String>, order: Order) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }
}

/// A compiled query, ready for an adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Kind name
    pub kind: String,
    /// All must match
    pub filters: Vec<Filter>,
    /// Applied in order; later keys break ties of earlier ones
    pub sorts: Vec<Sort>,
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Number of leading results to skip
    pub offset: Option<usize>,
}

impl Query {
    /// Query every record of a kind
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            filters: Vec::new(),
            sorts: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Append a canonical filter
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append a canonical sort key
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Set the limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Caller-facing query options, in application terms
///
/// Field names are canonical (application) names; operators and orders may
/// use any accepted spelling. Nothing is validated until
/// [`Schema::build_query`].
///
/// ```
/// use polystore_core::FindOptions;
///
/// let options = FindOptions::new()
///     .filter("age", ">", 2)
///     .filter("age", "lt", 5)
///     .sort("name", "ascending")
///     .limit(10);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Raw (field, operator, value) triples
    pub filters: Vec<(String, String, Value)>,
    /// Raw (field, order) pairs
    pub sorts: Vec<(String, String)>,
    /// Maximum number of results
    pub limit: Option<usize>,
    /// Number of leading results to skip
    pub offset: Option<usize>,
}

impl FindOptions {
    /// No filters, sorts, limit or offset
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter using any accepted operator spelling
    pub fn filter(mut self, field: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.filters
            .push((field.to_string(), operator.to_string(), value.into()));
        self
    }

    /// Add a filter with a canonical operator
    pub fn filter_op(self, field: &str, operator: Operator, value: impl Into<Value>) -> Self {
        self.filter(field, operator.as_str(), value)
    }

    /// Add a sort key using any accepted order spelling
    pub fn sort(mut self, field: &str, order: &str) -> Self {
        self.sorts.push((field.to_string(), order.to_string()));
        self
    }

    /// Add a sort key with a canonical order
    pub fn sort_by(self, field: &str, order: Order) -> Self {
        self.sort(field, order.as_str())
    }

    /// Set the limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl Schema {
    /// Compile caller options into a canonical query
    ///
    /// Operators and orders are normalized, field names resolved to storage
    /// names, and filter values packed with the field's packer so the
    /// backend compares like with like. For `In`, each element of an array
    /// value is packed on its own.
    ///
    /// # Errors
    ///
    /// `Schema` for an unknown operator or order spelling or an uncoercible
    /// filter value. No backend is involved.
    pub fn build_query(
        &self,
        kind: &str,
        options: &FindOptions,
        keys: Option<&dyn KeyCodec>,
    ) -> Result<Query> {
        let kind = format_kind(kind);
        let ctx = PackContext::new(self, keys);

        let filters = options
            .filters
            .iter()
            .map(|(field, operator, value)| {
                let operator = Operator::parse(operator)?;
                let value = match (operator, value) {
                    (Operator::In, Value::Array(items)) => Value::Array(
                        items
                            .iter()
                            .map(|item| self.pack_value(&kind, field, item.clone(), &ctx))
                            .collect::<Result<Vec<_>>>()?,
                    ),
                    (Operator::In, other) => other.clone(),
                    (_, other) => self.pack_value(&kind, field, other.clone(), &ctx)?,
                };
                Ok(Filter {
                    field: self.pack_field(&kind, field),
                    operator,
                    value,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let sorts = options
            .sorts
            .iter()
            .map(|(field, order)| {
                Ok(Sort {
                    field: self.pack_field(&kind, field),
                    order: Order::parse(order)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Query {
            kind,
            filters,
            sorts,
            limit: options.limit,
            offset: options.offset,
        })
    }
}
