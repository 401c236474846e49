//! Secondary-index adapter for Polystore
//!
//! Stores records as documents in per-kind buckets with secondary indexes:
//! - Client: the bucket/index/job protocol (`IndexClient`)
//! - Mapreduce: data-described job stages and their execution
//! - Planner: which filter drives the index lookup
//! - Memory: an in-process index server implementing the protocol
//! - Datastore: the `Datastore` implementation

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod datastore;
pub mod mapreduce;
pub mod memory;
pub mod planner;

pub use client::{
    Document, IndexClient, IndexClientError, IndexEntry, IndexQuery, IndexValue, Job, JobOutput,
    BUCKET_INDEX,
};
pub use datastore::IndexDatastore;
pub use mapreduce::Stage;
pub use memory::MemoryIndexClient;
pub use planner::{plan, IndexPlan};
