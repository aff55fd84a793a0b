//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest schema.
//! - Storage constraint failures surface as typed integrity errors, with no
//!   retry at this layer.

pub mod error;
pub mod note_repo;
pub mod profile_repo;
mod schema;
