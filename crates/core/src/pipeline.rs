//! In-process query evaluation
//!
//! Backends that cannot push a query down evaluate it here, over packed
//! records: filter, then sort, then offset, then limit.
//!
//! A missing field reads as `Null`. `Int` and `Float` compare numerically
//! and exactly, without rounding the integer. Range operators only match
//! comparable operands, and NaN is comparable with nothing. Sorting is total:
//! NaN sorts after every other number, and types order by family
//! `Null < Bool < number < String < Bytes < Array < Object`.

use std::cmp::Ordering;

use crate::query::{Filter, Operator, Order, Query, Sort};
use crate::record::Record;
use crate::value::Value;

static NULL: Value = Value::Null;

fn field_of<'r>(record: &'r Record, field: &str) -> &'r Value {
    record.get(field).unwrap_or(&NULL)
}

/// 2^63, the first float past `i64::MAX`
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Exact ordering of an integer against a float, `None` for NaN
fn cmp_int_float(x: i64, y: f64) -> Option<Ordering> {
    if y.is_nan() {
        return None;
    }
    if y >= I64_LIMIT {
        return Some(Ordering::Less);
    }
    if y < -I64_LIMIT {
        return Some(Ordering::Greater);
    }
    let whole = y.trunc();
    match x.cmp(&(whole as i64)) {
        Ordering::Equal => 0.0f64.partial_cmp(&(y - whole)),
        other => Some(other),
    }
}

fn is_nan(v: &Value) -> bool {
    matches!(v, Value::Float(f) if f.is_nan())
}

/// Equality with numeric widening between `Int` and `Float`
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Int(x), Value::Float(y)) | (Value::Float(y), Value::Int(x)) => {
            cmp_int_float(*x, *y) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

/// Ordering between comparable values, `None` otherwise
///
/// Comparable means both numbers, both strings, both booleans or both byte
/// strings. NaN compares with nothing.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Float(y)) => cmp_int_float(*x, *y),
        (Value::Float(x), Value::Int(y)) => cmp_int_float(*y, *x).map(Ordering::reverse),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting
pub fn sort_cmp(a: &Value, b: &Value) -> Ordering {
    if a.is_number() && b.is_number() {
        // Only NaN makes two numbers incomparable
        return compare_values(a, b).unwrap_or_else(|| is_nan(a).cmp(&is_nan(b)));
    }
    if let Some(ord) = compare_values(a, b) {
        return ord;
    }
    match a.type_rank().cmp(&b.type_rank()) {
        Ordering::Equal => {}
        other => return other,
    }
    match (a, b) {
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y.iter())
            .map(|(l, r)| sort_cmp(l, r))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x.len().cmp(&y.len()),
        _ => Ordering::Equal,
    }
}

impl Filter {
    /// True when the record satisfies this filter
    pub fn matches(&self, record: &Record) -> bool {
        let actual = field_of(record, &self.field);
        match self.operator {
            Operator::Eq => values_equal(actual, &self.value),
            Operator::Ne => !values_equal(actual, &self.value),
            Operator::Lt => compare_values(actual, &self.value) == Some(Ordering::Less),
            Operator::Lte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => compare_values(actual, &self.value) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                compare_values(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => match (&self.value, actual) {
                (Value::Array(items), actual) => items.iter().any(|v| values_equal(actual, v)),
                (Value::String(haystack), Value::String(needle)) => {
                    haystack.contains(needle.as_str())
                }
                _ => false,
            },
        }
    }
}

/// True when every filter matches
pub fn matches_all(filters: &[Filter], record: &Record) -> bool {
    filters.iter().all(|f| f.matches(record))
}

/// Compare two records under a list of sort keys
pub fn compare_records(sorts: &[Sort], a: &Record, b: &Record) -> Ordering {
    for sort in sorts {
        let ord = sort_cmp(field_of(a, &sort.field), field_of(b, &sort.field));
        let ord = match sort.order {
            Order::Asc => ord,
            Order::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Keep matching records
pub fn apply_filters(records: Vec<Record>, filters: &[Filter]) -> Vec<Record> {
    if filters.is_empty() {
        return records;
    }
    records
        .into_iter()
        .filter(|r| matches_all(filters, r))
        .collect()
}

/// Stable multi-key sort
pub fn apply_sorts(records: &mut [Record], sorts: &[Sort]) {
    if sorts.is_empty() {
        return;
    }
    records.sort_by(|a, b| compare_records(sorts, a, b));
}

/// Skip leading records; past the end yields nothing
pub fn apply_offset(mut records: Vec<Record>, offset: Option<usize>) -> Vec<Record> {
    match offset {
        Some(n) if n >= records.len() => Vec::new(),
        Some(n) if n > 0 => records.split_off(n),
        _ => records,
    }
}

/// Keep at most `limit` records
pub fn apply_limit(mut records: Vec<Record>, limit: Option<usize>) -> Vec<Record> {
    if let Some(n) = limit {
        records.truncate(n);
    }
    records
}

/// Evaluate a query over candidate records of its kind
pub fn run_query(records: Vec<Record>, query: &Query) -> Vec<Record> {
    let mut matched = apply_filters(records, &query.filters);
    apply_sorts(&mut matched, &query.sorts);
    let matched = apply_offset(matched, query.offset);
    apply_limit(matched, query.limit)
}

/// Cardinality of the matching set, ignoring sort, offset and limit
pub fn count_matching<'a, I>(records: I, filters: &[Filter]) -> u64
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter(|r| matches_all(filters, r))
        .count() as u64
}
