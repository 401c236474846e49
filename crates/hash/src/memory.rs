//! In-process hash server
//!
//! A single `parking_lot::RwLock` guards the whole keyspace. Reads share the
//! lock; a batch takes it exclusively, type-checks every command first, and
//! only then applies them, so a reader never observes half a batch and a
//! rejected batch leaves no trace.

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeSet;

use crate::client::{Command, HashClient, HashClientError, HashMapping, Reply};

#[derive(Debug, Clone)]
enum Entry {
    Hash(HashMapping),
    Set(BTreeSet<String>),
}

/// Hash server living in process memory
#[derive(Debug, Default)]
pub struct MemoryHashClient {
    keyspace: RwLock<FxHashMap<String, Entry>>,
}

impl MemoryHashClient {
    /// Empty keyspace
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys
    pub fn key_count(&self) -> usize {
        self.keyspace.read().len()
    }

    /// True when the key exists
    pub fn exists(&self, key: &str) -> bool {
        self.keyspace.read().contains_key(key)
    }

    fn wrong_type(key: &str) -> HashClientError {
        HashClientError::WrongType {
            key: key.to_string(),
        }
    }

    fn check(keyspace: &FxHashMap<String, Entry>, command: &Command) -> Result<(), HashClientError> {
        let entry = keyspace.get(command.key());
        match (command, entry) {
            (_, None) | (Command::Del { .. }, _) => Ok(()),
            (Command::HGetAll { .. } | Command::HSet { .. }, Some(Entry::Hash(_))) => Ok(()),
            (Command::SAdd { .. } | Command::SRem { .. }, Some(Entry::Set(_))) => Ok(()),
            (cmd, Some(_)) => Err(Self::wrong_type(cmd.key())),
        }
    }

    fn apply(keyspace: &mut FxHashMap<String, Entry>, command: Command) -> Reply {
        match command {
            Command::HGetAll { key } => match keyspace.get(&key) {
                Some(Entry::Hash(h)) => Reply::Hash(h.clone()),
                _ => Reply::Hash(HashMapping::default()),
            },
            Command::HSet { key, fields } => {
                let entry = keyspace
                    .entry(key)
                    .or_insert_with(|| Entry::Hash(HashMapping::default()));
                let mut added = 0;
                if let Entry::Hash(h) = entry {
                    for (field, text) in fields {
                        if h.insert(field, text).is_none() {
                            added += 1;
                        }
                    }
                }
                Reply::Integer(added)
            }
            Command::Del { key } => Reply::Integer(i64::from(keyspace.remove(&key).is_some())),
            Command::SAdd { key, member } => {
                let entry = keyspace
                    .entry(key)
                    .or_insert_with(|| Entry::Set(BTreeSet::new()));
                match entry {
                    Entry::Set(s) => Reply::Integer(i64::from(s.insert(member))),
                    Entry::Hash(_) => Reply::Integer(0),
                }
            }
            Command::SRem { key, member } => {
                let (removed, now_empty) = match keyspace.get_mut(&key) {
                    Some(Entry::Set(s)) => (s.remove(&member), s.is_empty()),
                    _ => (false, false),
                };
                if now_empty {
                    keyspace.remove(&key);
                }
                Reply::Integer(i64::from(removed))
            }
        }
    }
}

impl HashClient for MemoryHashClient {
    fn hgetall(&self, key: &str) -> Result<HashMapping, HashClientError> {
        match self.keyspace.read().get(key) {
            Some(Entry::Hash(h)) => Ok(h.clone()),
            Some(Entry::Set(_)) => Err(Self::wrong_type(key)),
            None => Ok(HashMapping::default()),
        }
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, HashClientError> {
        match self.keyspace.read().get(key) {
            Some(Entry::Hash(h)) => Ok(h.get(field).cloned()),
            Some(Entry::Set(_)) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>, HashClientError> {
        match self.keyspace.read().get(key) {
            Some(Entry::Set(s)) => Ok(s.iter().cloned().collect()),
            Some(Entry::Hash(_)) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    fn multi(&self, commands: Vec<Command>) -> Result<Vec<Reply>, HashClientError> {
        let mut keyspace = self.keyspace.write();

        // Keys deleted earlier in the batch may legally change type later.
        let mut deleted: FxHashSet<&str> = FxHashSet::default();
        for command in &commands {
            if let Command::Del { key } = command {
                deleted.insert(key);
            } else if !deleted.contains(command.key()) {
                Self::check(&keyspace, command)?;
            }
        }

        Ok(commands
            .into_iter()
            .map(|c| Self::apply(&mut keyspace, c))
            .collect())
    }
}
