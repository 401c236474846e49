//! Hash client protocol
//!
//! The narrow slice of a hash server's command set the adapter needs:
//! whole-hash reads, single-field reads, set membership, and an atomic
//! batch (`MULTI`/`EXEC`) for everything that writes.
//!
//! A batch is all-or-nothing: either every command applies and a reply is
//! returned for each, in order, or none applies and the batch fails.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// Field → text contents of one hash
pub type HashMapping = FxHashMap<String, String>;

/// Error reported by a hash client
#[derive(Debug, Error)]
pub enum HashClientError {
    /// A command addressed a key holding another type of value
    #[error("WRONGTYPE operation against key '{key}' holding the wrong kind of value")]
    WrongType {
        /// Offending key
        key: String,
    },

    /// The server could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The server answered with something the client did not expect
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// One command inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Read a whole hash
    HGetAll {
        /// Hash key
        key: String,
    },
    /// Merge fields into a hash, creating it if absent
    HSet {
        /// Hash key
        key: String,
        /// Field/text pairs to write
        fields: Vec<(String, String)>,
    },
    /// Remove a key of any type
    Del {
        /// Key to remove
        key: String,
    },
    /// Add a member to a set, creating it if absent
    SAdd {
        /// Set key
        key: String,
        /// Member to add
        member: String,
    },
    /// Remove a member from a set
    SRem {
        /// Set key
        key: String,
        /// Member to remove
        member: String,
    },
}

impl Command {
    /// The key the command touches
    pub fn key(&self) -> &str {
        match self {
            Command::HGetAll { key }
            | Command::HSet { key, .. }
            | Command::Del { key }
            | Command::SAdd { key, .. }
            | Command::SRem { key, .. } => key,
        }
    }
}

/// Reply to one batched command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Number of elements added, removed or written
    Integer(i64),
    /// Contents of a hash (empty when the key is absent)
    Hash(HashMapping),
}

impl Reply {
    /// Take the hash out of an `HGETALL` reply
    pub fn into_hash(self) -> Result<HashMapping, HashClientError> {
        match self {
            Reply::Hash(h) => Ok(h),
            other => Err(HashClientError::Protocol(format!(
                "expected a hash reply, got {:?}",
                other
            ))),
        }
    }
}

/// Blocking client for a hash server
pub trait HashClient: Send + Sync {
    /// All fields of a hash; empty when the key is absent
    fn hgetall(&self, key: &str) -> Result<HashMapping, HashClientError>;

    /// One field of a hash
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>, HashClientError>;

    /// Members of a set in a stable order; empty when the key is absent
    fn smembers(&self, key: &str) -> Result<Vec<String>, HashClientError>;

    /// Run commands as one atomic batch
    fn multi(&self, commands: Vec<Command>) -> Result<Vec<Reply>, HashClientError>;
}
