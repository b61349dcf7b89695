//! JSON bodies exchanged over the HTTP API.
//!
//! Nothing here is persisted; the object store is the system of record.

pub mod file;
