//! Domain model for the note outline.
//!
//! # Responsibility
//! - Define the note, profile and tree shapes used by repositories and
//!   services.
//!
//! # Invariants
//! - Every note belongs to exactly one owner, and so do all its descendants.
//! - Deletion is a hard delete that cascades to descendants.

pub mod note;
pub mod profile;
pub mod tree;
