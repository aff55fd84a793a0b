//! Outline editing use-case service.
//!
//! # Responsibility
//! - Create notes at the end of, or inside, a sibling list.
//! - Provide indent/outdent/move edits with hierarchy validation.
//! - Build the nested tree view for one owner.
//!
//! # Invariants
//! - Move operations must not create parent-child cycles.
//! - Indent needs a preceding sibling; outdent needs a parent.
//! - Edits never touch a note's `id` or `number`.

use crate::model::note::{Note, NoteDraft, NoteId, NotePlacement, Pane, UserId};
use crate::model::tree::{build_forest, NoteTreeNode};
use crate::repo::error::RepoError;
use crate::repo::note_repo::NoteRepository;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Errors from outline service operations.
#[derive(Debug)]
pub enum OutlineServiceError {
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Indent requested on the first note of its sibling list.
    NoPrecedingSibling(NoteId),
    /// Outdent requested on a root-level note.
    AlreadyRootLevel(NoteId),
    /// Move would place a note under itself or one of its descendants.
    CycleDetected { note_id: NoteId, parent_id: NoteId },
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for OutlineServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::NoPrecedingSibling(id) => {
                write!(f, "note {id} has no preceding sibling to indent under")
            }
            Self::AlreadyRootLevel(id) => write!(f, "note {id} is already at root level"),
            Self::CycleDetected { note_id, parent_id } => write!(
                f,
                "move would create cycle: note {note_id} under parent {parent_id}"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OutlineServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for OutlineServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NoteNotFound(id) => Self::NoteNotFound(id),
            RepoError::RootLevelNote(id) => Self::AlreadyRootLevel(id),
            other => Self::Repo(other),
        }
    }
}

pub type OutlineResult<T> = Result<T, OutlineServiceError>;

/// Outline service facade over a note repository.
pub struct OutlineService<R: NoteRepository> {
    repo: R,
}

impl<R: NoteRepository> OutlineService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one note from a fully specified draft.
    pub fn create_note(&self, draft: &NoteDraft) -> OutlineResult<Note> {
        self.repo.create_note(draft).map_err(Into::into)
    }

    /// Appends a root-level note for `owner_id`.
    pub fn create_root_note(
        &self,
        owner_id: UserId,
        text: impl Into<String>,
    ) -> OutlineResult<Note> {
        self.create_note(&NoteDraft::root(owner_id, text))
    }

    /// Appends a child under `parent_id`, owned by the parent's owner.
    pub fn create_child_note(
        &self,
        parent_id: NoteId,
        text: impl Into<String>,
    ) -> OutlineResult<Note> {
        let parent = self.require_note(parent_id)?;
        self.create_note(&NoteDraft::child(parent.owner_id, parent_id, text))
    }

    /// Creates a note right after `note_id`, as an editor does on Enter.
    ///
    /// When `note_id` has children the new note becomes its first child;
    /// otherwise it becomes the next sibling. Later notes shift down.
    pub fn add_note_after(&self, note_id: NoteId, text: impl Into<String>) -> OutlineResult<Note> {
        let anchor = self.require_note(note_id)?;
        let has_children = !self.repo.list_children(note_id)?.is_empty();

        let draft = if has_children {
            NoteDraft::child(anchor.owner_id, note_id, text)
                .with_placement(NotePlacement::Index(0))
        } else {
            let index = self.sibling_index(&anchor)?;
            let draft = match anchor.parent_id {
                Some(parent_id) => NoteDraft::child(anchor.owner_id, parent_id, text),
                None => NoteDraft::root(anchor.owner_id, text),
            };
            draft.with_placement(NotePlacement::Index(index + 1))
        };
        self.create_note(&draft)
    }

    /// Loads one note by identifier.
    pub fn get_note(&self, note_id: NoteId) -> OutlineResult<Option<Note>> {
        self.repo.get_note(note_id).map_err(Into::into)
    }

    /// Loads one note by its per-owner number.
    pub fn get_note_by_number(&self, owner_id: UserId, number: u32) -> OutlineResult<Option<Note>> {
        self.repo
            .get_note_by_number(owner_id, number)
            .map_err(Into::into)
    }

    /// Lists immediate children in display order.
    pub fn children(&self, note_id: NoteId) -> OutlineResult<Vec<Note>> {
        self.repo.list_children(note_id).map_err(Into::into)
    }

    /// Lists an owner's root notes in display order.
    pub fn root_notes(&self, owner_id: UserId) -> OutlineResult<Vec<Note>> {
        self.repo.root_notes(owner_id).map_err(Into::into)
    }

    /// Next free position for a new child of `note`.
    ///
    /// Advisory: nothing is reserved, so the value can be taken by a
    /// concurrent writer before it is used.
    pub fn next_child_position(&self, note: &Note) -> OutlineResult<u32> {
        self.repo.next_child_position(note.id).map_err(Into::into)
    }

    /// Next free root position for `owner_id`. Advisory, like
    /// [`Self::next_child_position`].
    pub fn next_root_position(&self, owner_id: UserId) -> OutlineResult<u32> {
        self.repo.next_root_position(owner_id).map_err(Into::into)
    }

    /// Makes the note the last child of its preceding sibling.
    pub fn indent_note(&self, note_id: NoteId) -> OutlineResult<Note> {
        let note = self.require_note(note_id)?;
        let siblings = self.siblings_of(&note)?;
        let index = siblings
            .iter()
            .position(|sibling| sibling.id == note_id)
            .ok_or(OutlineServiceError::NoteNotFound(note_id))?;
        if index == 0 {
            return Err(OutlineServiceError::NoPrecedingSibling(note_id));
        }

        let new_parent_id = siblings[index - 1].id;
        self.repo.move_note(note_id, Some(new_parent_id), None)?;
        self.require_note(note_id)
    }

    /// Moves the note into its grandparent, directly after its old parent.
    ///
    /// Siblings that followed the note become its trailing children.
    pub fn outdent_note(&self, note_id: NoteId) -> OutlineResult<Note> {
        let note = self.require_note(note_id)?;
        if note.is_root() {
            return Err(OutlineServiceError::AlreadyRootLevel(note_id));
        }
        self.repo.outdent_note(note_id)?;
        self.require_note(note_id)
    }

    /// Moves one note under an optional parent and optional sibling index.
    pub fn move_note(
        &self,
        note_id: NoteId,
        new_parent_id: Option<NoteId>,
        target_index: Option<u32>,
    ) -> OutlineResult<()> {
        self.require_note(note_id)?;

        if let Some(parent_id) = new_parent_id {
            if self.would_create_cycle(note_id, parent_id)? {
                return Err(OutlineServiceError::CycleDetected { note_id, parent_id });
            }
        }

        self.repo
            .move_note(note_id, new_parent_id, target_index)
            .map_err(Into::into)
    }

    /// Replaces note text.
    pub fn update_text(&self, note_id: NoteId, text: &str) -> OutlineResult<()> {
        self.repo.update_text(note_id, text).map_err(Into::into)
    }

    /// Publishes or unpublishes one note.
    pub fn set_public(&self, note_id: NoteId, public: bool) -> OutlineResult<()> {
        self.repo.set_public(note_id, public).map_err(Into::into)
    }

    /// Records whether the note is expanded in one pane.
    pub fn set_expanded(&self, note_id: NoteId, pane: Pane, expanded: bool) -> OutlineResult<()> {
        self.repo
            .set_expanded(note_id, pane, expanded)
            .map_err(Into::into)
    }

    /// Deletes one note with its whole subtree.
    pub fn delete_note(&self, note_id: NoteId) -> OutlineResult<()> {
        self.repo.delete_note(note_id).map_err(Into::into)
    }

    /// Loads the owner's full forest in display order.
    pub fn load_tree(&self, owner_id: UserId) -> OutlineResult<Vec<NoteTreeNode>> {
        let notes = self.repo.list_owner_notes(owner_id)?;
        Ok(build_forest(notes))
    }

    fn require_note(&self, note_id: NoteId) -> OutlineResult<Note> {
        self.repo
            .get_note(note_id)?
            .ok_or(OutlineServiceError::NoteNotFound(note_id))
    }

    fn siblings_of(&self, note: &Note) -> OutlineResult<Vec<Note>> {
        match note.parent_id {
            Some(parent_id) => self.repo.list_children(parent_id).map_err(Into::into),
            None => self.repo.root_notes(note.owner_id).map_err(Into::into),
        }
    }

    fn sibling_index(&self, note: &Note) -> OutlineResult<u32> {
        let siblings = self.siblings_of(note)?;
        let index = siblings
            .iter()
            .position(|sibling| sibling.id == note.id)
            .ok_or(OutlineServiceError::NoteNotFound(note.id))?;
        u32::try_from(index).map_err(|_| {
            OutlineServiceError::Repo(RepoError::InvalidData(format!(
                "sibling index {index} out of range"
            )))
        })
    }

    fn would_create_cycle(
        &self,
        note_id: NoteId,
        candidate_parent_id: NoteId,
    ) -> OutlineResult<bool> {
        let mut visited = HashSet::new();
        let mut cursor = Some(candidate_parent_id);
        while let Some(current) = cursor {
            if current == note_id || !visited.insert(current) {
                return Ok(true);
            }
            cursor = self.require_note(current)?.parent_id;
        }
        Ok(false)
    }
}
