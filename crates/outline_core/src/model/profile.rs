//! User profile model.
//!
//! # Invariants
//! - Exactly one profile exists per user row.
//! - `note_counter` never decreases.
//! - `focused_note_id` is not checked against the owning user.

use crate::model::note::{NoteId, UserId};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Per-user settings and numbering state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub user_id: UserId,
    pub username: String,
    pub focused_note_id: Option<NoteId>,
    pub spellcheck: bool,
    /// Lower bound for the next note number handed out to this user.
    pub note_counter: u32,
}

impl Display for UserProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.username)
    }
}
