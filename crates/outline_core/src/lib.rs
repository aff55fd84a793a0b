//! Core storage for hierarchical outline notes.
//! This crate owns the ordering, numbering and identifier invariants.

pub mod alloc;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, LoggingConfig, OutlineConfig, StoreConfig};
pub use db::{open_db, open_db_in_memory, open_db_with, ConnectionOptions, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::note::{
    Note, NoteDraft, NoteId, NotePlacement, NoteValidationError, Pane, UserId,
};
pub use model::profile::UserProfile;
pub use model::tree::NoteTreeNode;
pub use repo::error::{IntegrityViolation, RepoError, RepoResult};
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::profile_repo::{ProfileRepository, SqliteProfileRepository};
pub use service::outline_service::{OutlineResult, OutlineService, OutlineServiceError};
pub use service::profile_service::{ProfileService, ProfileServiceError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
