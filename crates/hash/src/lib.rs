//! Hash-store adapter for Polystore
//!
//! Stores typed records on a server whose hashes only hold text:
//! - Client: the hash command protocol (`HashClient`) and its atomic batch
//! - Memory: an in-process hash server implementing the protocol
//! - Codec: per-field type tags and the text encoding they imply
//! - Datastore: the `Datastore` implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod codec;
pub mod datastore;
pub mod memory;

pub use client::{Command, HashClient, HashClientError, HashMapping, Reply};
pub use codec::TypeTag;
pub use datastore::HashDatastore;
pub use memory::MemoryHashClient;
