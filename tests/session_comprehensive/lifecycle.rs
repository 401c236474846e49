//! Save, create, find, delete and count through a session

use crate::support::*;
use polystore::{Error, FindOptions, Record, Value};

// ============================================================================
// Save
// ============================================================================

#[test]
fn save_new_record_generates_key_and_applies_defaults() {
    for (backend, session) in sessions() {
        let fido = session.save(Record::new("dog").with("name", "Fido")).unwrap();
        assert_eq!(fido.key(), Some("k1"), "{}", backend);
        assert_eq!(fido.kind(), Some("dog"), "{}", backend);
        assert_eq!(fido.get("age"), Some(&Value::Int(0)), "{}", backend);

        let found = session.find_by_key("dog", "k1").unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Value::String("Fido".into())));
        assert_eq!(found.get("age"), Some(&Value::Int(0)), "{}", backend);
    }
}

#[test]
fn save_existing_record_updates_in_place() {
    for (backend, session) in sessions() {
        let mut fido = session.save(dog("Fido", 3)).unwrap();
        fido.set("age", 4);
        let updated = session.save(fido).unwrap();
        assert_eq!(updated.key(), Some("k1"), "{}", backend);
        assert_eq!(updated.get("age"), Some(&Value::Int(4)), "{}", backend);

        let all = all_dogs(&session);
        assert_eq!(all.len(), 1, "{}", backend);
        assert_eq!(ages(&all), vec![4], "{}", backend);
    }
}

#[test]
fn save_many_mixes_creates_and_updates() {
    for (backend, session) in sessions() {
        let rex = session.save(dog("Rex", 5)).unwrap();
        let saved = session
            .save_many(vec![rex.with("age", 6), dog("Ace", 1)])
            .unwrap();
        assert_eq!(saved.len(), 2, "{}", backend);
        assert_eq!(saved[0].key(), Some("k1"), "{}", backend);
        assert_eq!(saved[1].key(), Some("k2"), "{}", backend);
        assert_eq!(ages(&all_dogs(&session)), vec![1, 6], "{}", backend);
    }
}

#[test]
fn field_names_are_normalized_on_save() {
    for (backend, session) in sessions() {
        let saved = session
            .save(Record::new("Dog").with("Name", "Fido").with("Age", 4))
            .unwrap();
        assert_eq!(saved.get("name"), Some(&Value::String("Fido".into())), "{}", backend);
        assert_eq!(saved.get("age"), Some(&Value::Int(4)), "{}", backend);

        let found = session.find_by_key("dog", "k1").unwrap().unwrap();
        assert_eq!(found.get("name"), Some(&Value::String("Fido".into())), "{}", backend);
        assert!(!found.contains("Name"), "{}", backend);
    }
}

#[test]
fn reused_key_never_leaks_into_another_kind() {
    for (backend, session) in sessions() {
        session.create(dog("Fido", 3).with_key("x")).unwrap();
        session
            .create(Record::new("person").with_key("x").with("name", "Ann"))
            .unwrap();

        let dogs = session.find_by_kind("dog", &FindOptions::new()).unwrap();
        assert!(dogs.iter().all(|r| r.kind() == Some("dog")), "{}", backend);
        let dog_count = session.count_by_kind("dog", &FindOptions::new()).unwrap();
        assert_eq!(dog_count, dogs.len() as u64, "{}", backend);
        if backend == "hash" {
            // one keyspace: the person replaced the dog
            assert_eq!(dog_count, 0);
        }

        let people = session.find_by_kind("person", &FindOptions::new()).unwrap();
        assert_eq!(names(&people), vec!["Ann"], "{}", backend);
    }
}

#[test]
fn undeclared_fields_are_dropped() {
    for (backend, session) in sessions() {
        let saved = session.save(dog("Fido", 3).with("mood", "happy")).unwrap();
        assert!(!saved.contains("mood"), "{}", backend);
        let found = session.find_by_key("dog", "k1").unwrap().unwrap();
        assert!(!found.contains("mood"), "{}", backend);
    }
}

// ============================================================================
// Create
// ============================================================================

#[test]
fn create_honors_caller_keys() {
    for (backend, session) in sessions() {
        let created = session
            .create_many(vec![dog("Fido", 3).with_key("fido"), dog("Rex", 5)])
            .unwrap();
        assert_eq!(created[0].key(), Some("fido"), "{}", backend);
        assert_eq!(created[1].key(), Some("k1"), "{}", backend);
        assert!(session.find_by_key("dog", "fido").unwrap().is_some());

        let single = session.create(dog("Ace", 1)).unwrap();
        assert_eq!(single.key(), Some("k2"), "{}", backend);
    }
}

// ============================================================================
// Find by key
// ============================================================================

#[test]
fn find_by_key_absent_is_none() {
    for (backend, session) in sessions() {
        assert!(session.find_by_key("dog", "nope").unwrap().is_none(), "{}", backend);
        session.save(dog("Fido", 3)).unwrap();
        assert!(session.find_by_key("person", "k1").unwrap().is_none(), "{}", backend);
    }
}

// ============================================================================
// Delete and count
// ============================================================================

#[test]
fn delete_by_key_is_idempotent() {
    for (backend, session) in sessions() {
        session.save(dog("Fido", 3)).unwrap();
        session.delete_by_key("dog", "k1").unwrap();
        session.delete_by_key("dog", "k1").unwrap();
        session.delete_by_key("dog", "never").unwrap();
        assert!(session.find_by_key("dog", "k1").unwrap().is_none(), "{}", backend);
        assert!(all_dogs(&session).is_empty(), "{}", backend);
    }
}

#[test]
fn delete_by_kind_removes_only_matches() {
    for (backend, session) in sessions() {
        session
            .save_many((0..6).map(|i| dog(&format!("d{}", i), i)).collect())
            .unwrap();
        session
            .delete_by_kind("dog", &FindOptions::new().filter("age", ">=", 4))
            .unwrap();
        assert_eq!(ages(&all_dogs(&session)), vec![0, 1, 2, 3], "{}", backend);

        session.delete_by_kind("dog", &FindOptions::new()).unwrap();
        assert_eq!(
            session.count_by_kind("dog", &FindOptions::new()).unwrap(),
            0,
            "{}",
            backend
        );
    }
}

#[test]
fn count_by_kind_ignores_paging() {
    for (backend, session) in sessions() {
        session
            .save_many((0..12).map(|i| dog("x", i)).collect())
            .unwrap();
        let paged = FindOptions::new()
            .filter("age", "<", 10)
            .limit(3)
            .offset(2);
        assert_eq!(session.count_by_kind("dog", &paged).unwrap(), 10, "{}", backend);
        assert_eq!(session.find_by_kind("dog", &paged).unwrap().len(), 3, "{}", backend);
    }
}

#[test]
fn kinds_are_isolated() {
    for (backend, session) in sessions() {
        session.save(dog("Fido", 3)).unwrap();
        session
            .save(Record::new("person").with("name", "Ann"))
            .unwrap();
        assert_eq!(session.count_by_kind("dog", &FindOptions::new()).unwrap(), 1);
        assert_eq!(
            session.count_by_kind("person", &FindOptions::new()).unwrap(),
            1,
            "{}",
            backend
        );
        session.delete_by_kind("person", &FindOptions::new()).unwrap();
        assert_eq!(all_dogs(&session).len(), 1, "{}", backend);
    }
}

#[test]
fn invalid_values_fail_before_storage() {
    for (backend, session) in sessions() {
        let err = session.save(dog("Fido", 3).with("age", "old")).unwrap_err();
        assert!(matches!(err, Error::Schema(_)), "{}", backend);
        assert!(all_dogs(&session).is_empty(), "{}", backend);
    }
}
