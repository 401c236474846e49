//! Operators, sorting and paging through a session

use std::sync::Arc;

use crate::support::*;
use polystore::{Error, FindOptions, Operator, Order, Record, Session, UuidKeyGenerator, Value};
use polystore_hash::{Command, HashClient, HashClientError, HashDatastore, HashMapping, Reply};

fn eight_dogs(session: &Session) {
    session
        .save_many((0..8).map(|i| dog(&format!("d{}", i), i)).collect())
        .unwrap();
}

// ============================================================================
// Filters
// ============================================================================

#[test]
fn open_range_returns_only_interior() {
    for (backend, session) in sessions() {
        eight_dogs(&session);
        let options = FindOptions::new()
            .filter("age", ">", 2)
            .filter("age", "<", 5)
            .sort("age", "asc");
        let found = session.find_by_kind("dog", &options).unwrap();
        assert_eq!(ages(&found), vec![3, 4], "{}", backend);
    }
}

#[test]
fn closed_range_includes_bounds() {
    for (backend, session) in sessions() {
        eight_dogs(&session);
        let options = FindOptions::new()
            .filter("age", ">=", 2)
            .filter("age", "<=", 5)
            .sort("age", "asc");
        let found = session.find_by_kind("dog", &options).unwrap();
        assert_eq!(ages(&found), vec![2, 3, 4, 5], "{}", backend);
    }
}

#[test]
fn operator_spellings_are_equivalent() {
    let pairs = [
        ("=", "eq"),
        ("<", "lt"),
        ("<=", "lte"),
        (">", "gt"),
        (">=", "gte"),
        ("!=", "not"),
    ];
    for (backend, session) in sessions() {
        eight_dogs(&session);
        for (symbol, word) in pairs {
            let by_symbol = FindOptions::new().filter("age", symbol, 3).sort("age", "asc");
            let by_word = FindOptions::new().filter("age", word, 3).sort("age", "asc");
            assert_eq!(
                ages(&session.find_by_kind("dog", &by_symbol).unwrap()),
                ages(&session.find_by_kind("dog", &by_word).unwrap()),
                "{} {}",
                backend,
                symbol
            );
        }
        let typed = FindOptions::new().filter_op("age", Operator::Eq, 3);
        assert_eq!(ages(&session.find_by_kind("dog", &typed).unwrap()), vec![3]);
    }
}

#[test]
fn not_equal_excludes_value() {
    for (backend, session) in sessions() {
        eight_dogs(&session);
        let options = FindOptions::new().filter("age", "!=", 0).sort("age", "asc");
        assert_eq!(
            ages(&session.find_by_kind("dog", &options).unwrap()),
            vec![1, 2, 3, 4, 5, 6, 7],
            "{}",
            backend
        );
    }
}

#[test]
fn membership_matches_listed_values() {
    for (backend, session) in sessions() {
        eight_dogs(&session);
        let options = FindOptions::new()
            .filter("age", "in", vec![Value::Int(1), Value::Int(6), Value::Int(42)])
            .sort("age", "asc");
        assert_eq!(
            ages(&session.find_by_kind("dog", &options).unwrap()),
            vec![1, 6],
            "{}",
            backend
        );
    }
}

#[test]
fn membership_in_text_is_substring() {
    for (backend, session) in sessions() {
        session
            .save_many(vec![dog("Bo", 1), dog("Rex", 2), dog("Ace", 3)])
            .unwrap();
        let options = FindOptions::new()
            .filter("name", "contains", "Bobcat and Rex")
            .sort("age", "asc");
        assert_eq!(
            names(&session.find_by_kind("dog", &options).unwrap()),
            vec!["Bo", "Rex"],
            "{}",
            backend
        );
    }
}

#[test]
fn integer_filter_values_are_coerced() {
    for (backend, session) in sessions() {
        eight_dogs(&session);
        let options = FindOptions::new().filter("age", "=", "4");
        assert_eq!(
            ages(&session.find_by_kind("dog", &options).unwrap()),
            vec![4],
            "{}",
            backend
        );
    }
}

#[test]
fn equality_on_a_missing_field_matches_null() {
    for (backend, session) in sessions() {
        session
            .save(Record::new("specimen").with("label", "bare"))
            .unwrap();
        session
            .save(Record::new("specimen").with("label", "full").with("count", 1))
            .unwrap();
        let options = FindOptions::new().filter("count", "=", Value::Null);
        let found = session.find_by_kind("specimen", &options).unwrap();
        assert_eq!(found.len(), 1, "{}", backend);
        assert_eq!(found[0].get("label"), Some(&Value::String("bare".into())));
    }
}

#[test]
fn untyped_floats_match_integer_filters() {
    for (backend, session) in sessions() {
        session
            .save_many(vec![
                dog("Whole", 1).with("weight", 3.0),
                dog("Half", 2).with("weight", 2.5),
                dog("Light", 3).with("weight", 1.5),
                dog("Heavy", 4).with("weight", 7),
            ])
            .unwrap();
        let find = |op: &str, n: i64| {
            let options = FindOptions::new().filter("weight", op, n).sort("age", "asc");
            names(&session.find_by_kind("dog", &options).unwrap())
        };
        assert_eq!(find("=", 3), vec!["Whole"], "{}", backend);
        assert_eq!(find(">", 2), vec!["Whole", "Half", "Heavy"], "{}", backend);
        assert_eq!(find(">=", 3), vec!["Whole", "Heavy"], "{}", backend);
        assert_eq!(find("<", 3), vec!["Half", "Light"], "{}", backend);
        assert_eq!(find("<=", 2), vec!["Light"], "{}", backend);

        let heavier = FindOptions::new().filter("weight", ">", 2);
        assert_eq!(session.count_by_kind("dog", &heavier).unwrap(), 3, "{}", backend);
    }
}

#[test]
fn key_and_kind_filter_like_any_field() {
    for (backend, session) in sessions() {
        eight_dogs(&session);

        let by_key = FindOptions::new().filter("key", "=", "k2");
        assert_eq!(ages(&session.find_by_kind("dog", &by_key).unwrap()), vec![1], "{}", backend);
        assert_eq!(session.count_by_kind("dog", &by_key).unwrap(), 1, "{}", backend);

        let keys = FindOptions::new()
            .filter("key", "in", vec![Value::from("k1"), Value::from("k3")])
            .sort("age", "asc");
        assert_eq!(ages(&session.find_by_kind("dog", &keys).unwrap()), vec![0, 2], "{}", backend);

        let old_dogs = FindOptions::new()
            .filter("kind", "=", "dog")
            .filter("age", ">=", 6);
        assert_eq!(session.count_by_kind("dog", &old_dogs).unwrap(), 2, "{}", backend);

        let wrong_kind = FindOptions::new().filter("kind", "=", "person");
        assert!(session.find_by_kind("dog", &wrong_kind).unwrap().is_empty(), "{}", backend);
        assert_eq!(session.count_by_kind("dog", &wrong_kind).unwrap(), 0, "{}", backend);
    }
}

// ============================================================================
// Rejected queries
// ============================================================================

/// Hash client that refuses every call
struct DownClient;

impl HashClient for DownClient {
    fn hgetall(&self, _: &str) -> Result<HashMapping, HashClientError> {
        Err(HashClientError::Connection("refused".into()))
    }

    fn hget(&self, _: &str, _: &str) -> Result<Option<String>, HashClientError> {
        Err(HashClientError::Connection("refused".into()))
    }

    fn smembers(&self, _: &str) -> Result<Vec<String>, HashClientError> {
        Err(HashClientError::Connection("refused".into()))
    }

    fn multi(&self, _: Vec<Command>) -> Result<Vec<Reply>, HashClientError> {
        Err(HashClientError::Connection("refused".into()))
    }
}

#[test]
fn unknown_operator_fails_before_the_backend_is_contacted() {
    let down = HashDatastore::new(DownClient, Arc::new(UuidKeyGenerator));
    let session = Session::new(schema(), Arc::new(down));

    let bad = FindOptions::new().filter("age", "~=", 3);
    assert!(matches!(session.find_by_kind("dog", &bad), Err(Error::Schema(_))));
    assert!(matches!(session.count_by_kind("dog", &bad), Err(Error::Schema(_))));
    assert!(matches!(session.delete_by_kind("dog", &bad), Err(Error::Schema(_))));

    let bad_order = FindOptions::new().sort("age", "sideways");
    assert!(matches!(
        session.find_by_kind("dog", &bad_order),
        Err(Error::Schema(_))
    ));

    let fine = FindOptions::new().filter("age", "=", 3);
    assert!(matches!(
        session.find_by_kind("dog", &fine),
        Err(Error::Adapter { backend: "hash", .. })
    ));
}

// ============================================================================
// Sorting
// ============================================================================

#[test]
fn multi_key_sort_breaks_ties_in_order() {
    for (backend, session) in sessions() {
        session
            .save_many(vec![
                dog("Cleo", 3),
                dog("Abe", 5),
                dog("Bea", 3),
                dog("Dot", 5),
                dog("Ace", 1),
            ])
            .unwrap();
        let options = FindOptions::new()
            .sort_by("age", Order::Desc)
            .sort("name", "asc");
        let found = session.find_by_kind("dog", &options).unwrap();
        assert_eq!(
            names(&found),
            vec!["Abe", "Dot", "Bea", "Cleo", "Ace"],
            "{}",
            backend
        );
    }
}

#[test]
fn sort_order_spellings_are_equivalent() {
    for (backend, session) in sessions() {
        eight_dogs(&session);
        let short = session
            .find_by_kind("dog", &FindOptions::new().sort("age", "desc"))
            .unwrap();
        let long = session
            .find_by_kind("dog", &FindOptions::new().sort("age", "descending"))
            .unwrap();
        assert_eq!(ages(&short), ages(&long), "{}", backend);
        assert_eq!(ages(&short), vec![7, 6, 5, 4, 3, 2, 1, 0], "{}", backend);
    }
}

#[test]
fn nan_weights_sort_after_every_number() {
    for (backend, session) in sessions() {
        let dogs = (0..40i64)
            .map(|i| {
                let weight = if i % 5 == 0 {
                    Value::Float(f64::NAN)
                } else if i % 2 == 0 {
                    Value::Float((i * 7 % 13) as f64 / 2.0)
                } else {
                    Value::Int(i * 3 % 11 - 5)
                };
                dog(&format!("n{:02}", i), i).with("weight", weight)
            })
            .collect();
        session.save_many(dogs).unwrap();

        let options = FindOptions::new().sort("weight", "asc");
        let found = session.find_by_kind("dog", &options).unwrap();
        let weights: Vec<f64> = found
            .iter()
            .filter_map(|r| r.get("weight").and_then(Value::as_f64))
            .collect();
        assert_eq!(weights.len(), 40, "{}", backend);

        let (numbers, nans) = weights.split_at(32);
        assert!(nans.iter().all(|w| w.is_nan()), "{}", backend);
        assert!(numbers.iter().all(|w| !w.is_nan()), "{}", backend);
        assert!(numbers.windows(2).all(|p| p[0] <= p[1]), "{}", backend);
    }
}

// ============================================================================
// Paging
// ============================================================================

#[test]
fn offset_then_limit_selects_a_page() {
    for (backend, session) in sessions() {
        session
            .save_many((0..25).map(|i| dog(&format!("n{:02}", i), i)).collect())
            .unwrap();
        let page = FindOptions::new().sort("name", "asc").limit(10).offset(10);
        let found = session.find_by_kind("dog", &page).unwrap();
        assert_eq!(ages(&found), (10..20).collect::<Vec<_>>(), "{}", backend);

        let tail = FindOptions::new().sort("name", "asc").limit(10).offset(20);
        assert_eq!(session.find_by_kind("dog", &tail).unwrap().len(), 5);

        let past_end = FindOptions::new().offset(30);
        assert!(session.find_by_kind("dog", &past_end).unwrap().is_empty());
    }
}

#[test]
fn zero_limit_returns_nothing() {
    for (backend, session) in sessions() {
        eight_dogs(&session);
        let options = FindOptions::new().limit(0);
        assert!(
            session.find_by_kind("dog", &options).unwrap().is_empty(),
            "{}",
            backend
        );
    }
}
