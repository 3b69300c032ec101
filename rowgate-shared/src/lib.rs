//! # rowgate Shared Library
//!
//! Store-facing building blocks used by the rowgate API server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool, store traits, PostgreSQL and in-memory backends
//! - `models`: typed records and their queries

pub mod db;
pub mod models;

/// Current version of the rowgate shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
