//! Note domain model.
//!
//! # Responsibility
//! - Define the persisted note record and the draft used to create one.
//! - Describe where a new note lands among its siblings.
//!
//! # Invariants
//! - `id` is non-negative and never reused for another note.
//! - `id` and `number` are fixed at first insert and never recomputed.
//! - `position` is unique among notes sharing a parent; root notes share
//!   the scope of their owner.

use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Opaque, globally unique note identifier drawn from `[0, i64::MAX)`.
pub type NoteId = i64;

/// Identifier of the owning user row.
pub type UserId = i64;

/// Persisted note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Note {
    pub id: NoteId,
    pub owner_id: UserId,
    /// `None` means root-level note.
    pub parent_id: Option<NoteId>,
    /// Display order among siblings, ascending.
    pub position: u32,
    /// Per-owner reference number. Monotonic, may have gaps.
    pub number: u32,
    pub text: String,
    pub public: bool,
    pub expanded_in_minor_pane: bool,
    pub expanded_in_major_pane: bool,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms, refreshed on every write to this row.
    pub updated_at: i64,
}

impl Note {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_expanded_in(&self, pane: Pane) -> bool {
        match pane {
            Pane::Minor => self.expanded_in_minor_pane,
            Pane::Major => self.expanded_in_major_pane,
        }
    }
}

impl Display for Note {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// UI pane whose expansion state is tracked per note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pane {
    Minor,
    Major,
}

/// Where a new note is placed among its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotePlacement {
    /// After the last sibling (`max(position) + 1`, or `0`).
    #[default]
    Append,
    /// Exactly this position. Fails with an integrity error when taken.
    Exact(u32),
    /// At this sibling index; later siblings shift down by one.
    Index(u32),
}

/// Input for creating one note.
///
/// `number` is never part of the draft: it is always allocated by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    /// Caller-supplied identifier. `None` lets storage draw a random one.
    pub id: Option<NoteId>,
    pub owner_id: UserId,
    pub parent_id: Option<NoteId>,
    pub placement: NotePlacement,
    pub text: String,
    pub public: bool,
    pub expanded_in_minor_pane: bool,
    pub expanded_in_major_pane: bool,
}

impl NoteDraft {
    /// Draft for a root-level note appended after the owner's last root note.
    pub fn root(owner_id: UserId, text: impl Into<String>) -> Self {
        Self {
            id: None,
            owner_id,
            parent_id: None,
            placement: NotePlacement::Append,
            text: text.into(),
            public: false,
            expanded_in_minor_pane: false,
            expanded_in_major_pane: true,
        }
    }

    /// Draft for a child note appended after the parent's last child.
    pub fn child(owner_id: UserId, parent_id: NoteId, text: impl Into<String>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Self::root(owner_id, text)
        }
    }

    pub fn with_id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_placement(mut self, placement: NotePlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Shorthand for [`NotePlacement::Exact`].
    pub fn at_position(self, position: u32) -> Self {
        self.with_placement(NotePlacement::Exact(position))
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    /// Checks draft-local invariants before any SQL runs.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if let Some(id) = self.id {
            if id < 0 {
                return Err(NoteValidationError::NegativeId(id));
            }
            if self.parent_id == Some(id) {
                return Err(NoteValidationError::ParentIsSelf(id));
            }
        }
        Ok(())
    }
}

/// Draft validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteValidationError {
    NegativeId(NoteId),
    ParentIsSelf(NoteId),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeId(id) => write!(f, "note id must be non-negative, got {id}"),
            Self::ParentIsSelf(id) => write!(f, "note {id} cannot be its own parent"),
        }
    }
}

impl Error for NoteValidationError {}
