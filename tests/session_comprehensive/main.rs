//! Session-level tests for polystore
//!
//! Every scenario runs against both adapters through the same `Session`
//! API, so each test doubles as a check that the backends agree.
//!
//! - `lifecycle`: save, create, find, delete and count
//! - `types`: coercion, timestamps, embedded kinds and foreign keys
//! - `queries`: operators, sorting and paging
//! - `config`: sessions opened from `polystore.toml`


mod config;
mod lifecycle;
mod queries;
mod types;
