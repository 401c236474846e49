//! Sessions opened from `polystore.toml`

use tempfile::TempDir;

use crate::support::*;
use polystore::{
    Datastore, DatastoreConfig, Error, FindOptions, KeyCodec, Record, Session, Value,
    CONFIG_FILE_NAME,
};

#[test]
fn default_file_opens_the_hash_backend() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    DatastoreConfig::write_default_if_missing(&path).unwrap();

    let config = DatastoreConfig::from_file(&path).unwrap();
    let session = Session::open(schema(), &config).unwrap();
    assert_eq!(session.datastore().unwrap().name(), "hash");

    let fido = session.save(Record::new("dog").with("name", "Fido")).unwrap();
    let key = fido.key().unwrap().to_string();
    assert_eq!(key.len(), 32);
    assert_eq!(session.find_by_key("dog", &key).unwrap(), Some(fido));
}

#[test]
fn index_file_opens_a_prefixed_index_backend() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "backend = \"index\"\napp = \"shop_\"\n").unwrap();

    let config = DatastoreConfig::from_file(&path).unwrap();
    let session = Session::open(schema(), &config).unwrap();
    let datastore = session.datastore().unwrap();
    assert_eq!(datastore.name(), "index");

    let packed = datastore
        .pack_key("person", &Value::String("ann".into()))
        .unwrap();
    assert_eq!(packed.as_str(), Some("shop_person/ann"));

    session
        .save_many((0..4).map(|i| dog(&format!("d{}", i), i)).collect())
        .unwrap();
    let options = FindOptions::new().filter("age", ">", 1);
    assert_eq!(session.count_by_kind("dog", &options).unwrap(), 2);
}

#[test]
fn written_config_reopens_the_same_backend() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    let config = DatastoreConfig {
        backend: "index".to_string(),
        app: "crm_".to_string(),
    };
    config.write_to_file(&path).unwrap();

    let reopened = DatastoreConfig::from_file(&path).unwrap();
    let session = Session::open(schema(), &reopened).unwrap();
    assert_eq!(session.datastore().unwrap().name(), "index");
}

#[test]
fn unknown_backend_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "backend = \"columnar\"\n").unwrap();
    assert!(matches!(
        DatastoreConfig::from_file(&path),
        Err(Error::Config(_))
    ));

    let config = DatastoreConfig {
        backend: "columnar".to_string(),
        app: String::new(),
    };
    assert!(matches!(
        Session::open(schema(), &config),
        Err(Error::Config(_))
    ));
}
