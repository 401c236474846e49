//! Coercion, timestamps, embedded kinds and foreign keys end to end

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::support::*;
use polystore::{Error, FindOptions, Record, Session, Value};
use polystore_hash::HashClient;
use polystore_index::IndexClient;

const MARCH_1_2024_NOON_MICROS: i64 = 1_709_294_400_000_000;

fn specimen() -> Record {
    let mut extra = BTreeMap::new();
    extra.insert("depth".to_string(), Value::Int(2));
    extra.insert("note".to_string(), Value::String("nested".into()));
    let mut collar = BTreeMap::new();
    collar.insert("color".to_string(), Value::String("red".into()));

    Record::new("specimen")
        .with("label", "alpha")
        .with("count", 7)
        .with("ratio", 2.5)
        .with("active", true)
        .with("seen", "2024-03-01T12:00:00Z")
        .with("tags", vec![Value::Int(1), Value::String("two".into())])
        .with("extra", extra)
        .with("collar", collar)
}

// ============================================================================
// Round trips
// ============================================================================

#[test]
fn every_value_shape_round_trips() {
    for (backend, session) in sessions() {
        let saved = session.save(specimen()).unwrap();
        let key = saved.key().unwrap().to_string();
        let found = session.find_by_key("specimen", &key).unwrap().unwrap();

        assert_eq!(found.get("label"), Some(&Value::String("alpha".into())), "{}", backend);
        assert_eq!(found.get("count"), Some(&Value::Int(7)), "{}", backend);
        assert_eq!(found.get("ratio"), Some(&Value::Float(2.5)), "{}", backend);
        assert_eq!(found.get("active"), Some(&Value::Bool(true)), "{}", backend);
        assert_eq!(
            found.get("seen"),
            Some(&Value::Int(MARCH_1_2024_NOON_MICROS)),
            "{}",
            backend
        );
        assert_eq!(
            found.get("tags"),
            Some(&Value::Array(vec![Value::Int(1), Value::String("two".into())])),
            "{}",
            backend
        );
        let extra = found.get("extra").and_then(Value::as_object).unwrap();
        assert_eq!(extra.get("depth"), Some(&Value::Int(2)), "{}", backend);
        assert_eq!(extra.get("note"), Some(&Value::String("nested".into())));
        assert_eq!(found, saved, "{}", backend);
    }
}

#[test]
fn scalars_are_coerced_to_declared_types() {
    for (backend, session) in sessions() {
        let saved = session
            .save(
                Record::new("specimen")
                    .with("label", 42)
                    .with("count", "17")
                    .with("ratio", 3)
                    .with("active", "false"),
            )
            .unwrap();
        assert_eq!(saved.get("label"), Some(&Value::String("42".into())), "{}", backend);
        assert_eq!(saved.get("count"), Some(&Value::Int(17)), "{}", backend);
        assert_eq!(saved.get("ratio"), Some(&Value::Float(3.0)), "{}", backend);
        assert_eq!(saved.get("active"), Some(&Value::Bool(false)), "{}", backend);
    }
}

#[test]
fn missing_fields_read_back_as_null() {
    for (backend, session) in sessions() {
        let saved = session.save(Record::new("specimen")).unwrap();
        for field in ["label", "count", "ratio", "active", "seen", "tags", "extra"] {
            assert_eq!(saved.get(field), Some(&Value::Null), "{} {}", backend, field);
        }
    }
}

// ============================================================================
// Embedded kinds
// ============================================================================

#[test]
fn embedded_kind_gets_its_own_defaults() {
    for (backend, session) in sessions() {
        let saved = session.save(specimen()).unwrap();
        let collar = saved.get("collar").and_then(Value::as_object).unwrap();
        assert_eq!(collar.get("color"), Some(&Value::String("red".into())), "{}", backend);
        assert_eq!(collar.get("size"), Some(&Value::Int(1)), "{}", backend);
    }
}

#[test]
fn missing_embedded_value_packs_as_empty_record() {
    for (backend, session) in sessions() {
        let saved = session.save(Record::new("specimen")).unwrap();
        let collar = saved.get("collar").and_then(Value::as_object).unwrap();
        assert_eq!(collar.get("color"), Some(&Value::Null), "{}", backend);
        assert_eq!(collar.get("size"), Some(&Value::Int(1)), "{}", backend);
    }
}

#[test]
fn embedded_value_must_be_an_object() {
    for (backend, session) in sessions() {
        let err = session
            .save(Record::new("specimen").with("collar", "red"))
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)), "{}", backend);
    }
}

// ============================================================================
// Timestamps
// ============================================================================

#[test]
fn created_at_is_stamped_on_first_save_only() {
    for (backend, session) in sessions() {
        let first = session.save(dog("Fido", 3)).unwrap();
        let created = first.get("created_at").and_then(Value::as_int);
        assert!(created.is_some(), "{}", backend);
        assert_eq!(first.get("updated_at"), Some(&Value::Null), "{}", backend);

        let second = session.save(first.with("age", 4)).unwrap();
        assert_eq!(
            second.get("created_at").and_then(Value::as_int),
            created,
            "{}",
            backend
        );
        let updated = second.get("updated_at").and_then(Value::as_int).unwrap();
        assert!(updated >= created.unwrap(), "{}", backend);
    }
}

#[test]
fn timestamps_filter_in_time_order() {
    for (backend, session) in sessions() {
        session.save(specimen()).unwrap();
        let seen = session
            .find_by_kind(
                "specimen",
                &FindOptions::new().filter("seen", ">", "2024-01-01T00:00:00Z"),
            )
            .unwrap();
        assert_eq!(seen.len(), 1, "{}", backend);
        let unseen = session
            .find_by_kind(
                "specimen",
                &FindOptions::new().filter("seen", ">", "2024-06-01T00:00:00Z"),
            )
            .unwrap();
        assert!(unseen.is_empty(), "{}", backend);
    }
}

// ============================================================================
// Foreign keys
// ============================================================================

#[test]
fn foreign_keys_read_back_as_plain_keys() {
    for (backend, session) in sessions() {
        let ann = session
            .save(Record::new("person").with("name", "Ann"))
            .unwrap();
        let ann_key = ann.key().unwrap().to_string();
        let fido = session
            .save(dog("Fido", 3).with("owner", ann_key.as_str()))
            .unwrap();
        assert_eq!(
            fido.get("owner"),
            Some(&Value::String(ann_key.clone())),
            "{}",
            backend
        );

        let owned = session
            .find_by_kind("dog", &FindOptions::new().filter("owner", "=", ann_key.as_str()))
            .unwrap();
        assert_eq!(names(&owned), vec!["Fido"], "{}", backend);
    }
}

#[test]
fn hash_backend_stores_keys_as_is() {
    let ds = Arc::new(hash_datastore());
    let session = Session::new(schema(), ds.clone());
    session
        .save(Record::new("person").with("name", "Ann").with_key("ann"))
        .unwrap();
    let fido = session.save(dog("Fido", 3).with("owner", "ann")).unwrap();
    let stored = ds.client().hget(fido.key().unwrap(), "owner").unwrap();
    assert_eq!(stored.as_deref(), Some("ann"));
}

#[test]
fn index_backend_stores_bucket_qualified_references() {
    let ds = Arc::new(index_datastore());
    let session = Session::new(schema(), ds.clone());
    session
        .save(Record::new("person").with("name", "Ann").with_key("ann"))
        .unwrap();
    let fido = session.save(dog("Fido", 3).with("owner", "ann")).unwrap();

    let body = ds
        .client()
        .get("app_dog", fido.key().unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(body.get("owner"), Some(&Value::String("app_person/ann".into())));
    assert_eq!(fido.get("owner"), Some(&Value::String("ann".into())));
}

#[test]
fn foreign_key_lists_are_packed_element_wise() {
    for (backend, session) in sessions() {
        let fido = session
            .save(dog("Fido", 3).with(
                "owner",
                vec![Value::String("a".into()), Value::String("b".into())],
            ))
            .unwrap();
        assert_eq!(
            fido.get("owner"),
            Some(&Value::Array(vec![
                Value::String("a".into()),
                Value::String("b".into())
            ])),
            "{}",
            backend
        );
    }
}

#[test]
fn foreign_keys_need_a_bound_session() {
    let session = Session::unbound(schema());
    let err = session
        .find_by_kind("dog", &FindOptions::new().filter("owner", "=", "ann"))
        .unwrap_err();
    assert!(matches!(err, Error::Binding(_)));
}
