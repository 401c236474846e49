//! Index selection
//!
//! Exactly one filter drives the server-side index lookup; every other
//! filter runs as a residual predicate over the lookup's output.
//!
//! A filter is a candidate when its operator is `=`, `<`, `<=`, `>` or `>=`,
//! its value is an Int (looked up in `<field>_int`) or a String
//! (`<field>_bin`), and its field is neither `kind` nor `key`. Those two
//! never reach a document body, so filters on them always run as residuals.
//! Selection order:
//!
//! 1. the first equality candidate, in declaration order
//! 2. otherwise the first range candidate, in declaration order
//! 3. otherwise the whole-bucket pseudo-index
//!
//! Lookups are inclusive. Float fields share the `_int` index under their
//! floor, so an integer lookup reads the closed bound `v` for every operator
//! and always keeps its filter as a residual. Text `>` starts at the
//! immediate successor and is fully enforced by the lookup; text `<` cannot
//! be expressed as an inclusive bound and keeps its filter.

use polystore_core::{Filter, Operator, Value, KEY_FIELD, KIND_FIELD};

use crate::client::{IndexQuery, IndexValue, BIN_SUFFIX, INT_SUFFIX};

/// A compiled index selection
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPlan {
    /// Lookup selecting candidate documents
    pub input: IndexQuery,
    /// Filters still to apply to the candidates, in declaration order
    pub residual: Vec<Filter>,
}

/// Pick the driving filter and split off the residuals
pub fn plan(filters: &[Filter]) -> IndexPlan {
    let chosen = first_candidate(filters, |op| op == Operator::Eq)
        .or_else(|| first_candidate(filters, |op| op.is_range()));

    let Some(position) = chosen else {
        return IndexPlan {
            input: IndexQuery::Bucket,
            residual: filters.to_vec(),
        };
    };

    let (input, exact) = lookup(&filters[position]);
    let residual = filters
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != position || !exact)
        .map(|(_, f)| f.clone())
        .collect();
    IndexPlan { input, residual }
}

fn first_candidate<P>(filters: &[Filter], accept: P) -> Option<usize>
where
    P: Fn(Operator) -> bool,
{
    filters.iter().position(|f| {
        accept(f.operator)
            && f.field != KIND_FIELD
            && f.field != KEY_FIELD
            && matches!(f.value, Value::Int(_) | Value::String(_))
    })
}

/// Translate a candidate into a lookup; the flag is true when the lookup
/// enforces the filter exactly
fn lookup(filter: &Filter) -> (IndexQuery, bool) {
    match &filter.value {
        Value::Int(v) => int_lookup(format!("{}{}", filter.field, INT_SUFFIX), filter.operator, *v),
        Value::String(s) => bin_lookup(
            format!("{}{}", filter.field, BIN_SUFFIX),
            filter.operator,
            s,
        ),
        _ => (IndexQuery::Bucket, false),
    }
}

fn range(index: String, min: Option<IndexValue>, max: Option<IndexValue>) -> IndexQuery {
    IndexQuery::Range { index, min, max }
}

fn int_lookup(index: String, op: Operator, v: i64) -> (IndexQuery, bool) {
    let int = || Some(IndexValue::Int(v));
    match op {
        Operator::Eq => (
            IndexQuery::Eq {
                index,
                value: IndexValue::Int(v),
            },
            false,
        ),
        Operator::Gt | Operator::Gte => (range(index, int(), None), false),
        Operator::Lt | Operator::Lte => (range(index, None, int()), false),
        Operator::Ne | Operator::In => (IndexQuery::Bucket, false),
    }
}

fn bin_lookup(index: String, op: Operator, s: &str) -> (IndexQuery, bool) {
    let bin = |t: String| Some(IndexValue::Bin(t));
    match op {
        Operator::Eq => (
            IndexQuery::Eq {
                index,
                value: IndexValue::Bin(s.to_string()),
            },
            true,
        ),
        Operator::Gte => (range(index, bin(s.to_string()), None), true),
        Operator::Lte => (range(index, None, bin(s.to_string())), true),
        Operator::Gt => (range(index, bin(format!("{}\0", s)), None), true),
        Operator::Lt => (range(index, None, bin(s.to_string())), false),
        Operator::Ne | Operator::In => (IndexQuery::Bucket, false),
    }
}
