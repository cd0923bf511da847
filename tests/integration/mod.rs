//! Integration tests for athena-relay.
//!
//! Most tests drive a `QueryRelay` against the scripted engine and the
//! in-memory object store. The HTTP clients are exercised against a
//! loopback server; nothing leaves the machine.

pub mod common;
pub mod config_test;
pub mod lifecycle_test;
pub mod query_test;
