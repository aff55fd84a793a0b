//! Note repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist notes and allocate their identifier, number and position.
//! - Keep sibling ordering and hierarchy moves inside the repository
//!   boundary.
//!
//! # Invariants
//! - Allocation and insert run in one `BEGIN IMMEDIATE` transaction, so two
//!   writers on the same database cannot be handed the same slot.
//! - Sibling listing is deterministic: `position ASC, id ASC`.
//! - A note and its parent always share an owner.
//! - Rewriting a sibling group never passes through a duplicate
//!   (parent, position) pair: rows are lifted above the owner's maximum
//!   position first, then written to their final slots.

use crate::alloc::{draw_unique_id, next_after, reserve_number, DEFAULT_ID_ATTEMPTS};
use crate::model::note::{Note, NoteDraft, NoteId, NotePlacement, Pane, UserId};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::schema::ensure_connection_ready;
use log::{debug, error};
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::time::Instant;

pub(crate) const NOTE_SELECT_SQL: &str = "SELECT
    id,
    owner_id,
    parent_id,
    position,
    number,
    text,
    public,
    expanded_in_minor_pane,
    expanded_in_major_pane,
    created_at,
    updated_at
FROM notes";

pub(crate) const NOTE_COLUMNS: &[&str] = &[
    "id",
    "owner_id",
    "parent_id",
    "position",
    "number",
    "text",
    "public",
    "expanded_in_minor_pane",
    "expanded_in_major_pane",
    "created_at",
    "updated_at",
];

/// Repository interface for note persistence and hierarchy edits.
pub trait NoteRepository {
    /// Inserts one note, allocating id, number and (unless exact) position.
    fn create_note(&self, draft: &NoteDraft) -> RepoResult<Note>;
    /// Loads one note by identifier.
    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// Loads one note by its per-owner number.
    fn get_note_by_number(&self, owner_id: UserId, number: u32) -> RepoResult<Option<Note>>;
    /// Lists immediate children of one note in display order.
    fn list_children(&self, parent_id: NoteId) -> RepoResult<Vec<Note>>;
    /// Lists an owner's root-level notes in display order.
    fn root_notes(&self, owner_id: UserId) -> RepoResult<Vec<Note>>;
    /// Lists every note of one owner.
    fn list_owner_notes(&self, owner_id: UserId) -> RepoResult<Vec<Note>>;
    /// `max(child position) + 1`, or `0` when the note has no children.
    fn next_child_position(&self, parent_id: NoteId) -> RepoResult<u32>;
    /// `max(root position) + 1` over the owner's root notes, or `0`.
    fn next_root_position(&self, owner_id: UserId) -> RepoResult<u32>;
    /// Replaces note text.
    fn update_text(&self, id: NoteId, text: &str) -> RepoResult<()>;
    /// Sets the public flag.
    fn set_public(&self, id: NoteId, public: bool) -> RepoResult<()>;
    /// Sets the expansion flag for one pane.
    fn set_expanded(&self, id: NoteId, pane: Pane, expanded: bool) -> RepoResult<()>;
    /// Moves one note under an optional parent at an optional sibling index.
    ///
    /// The target sibling group is renumbered `0..n`.
    fn move_note(
        &self,
        id: NoteId,
        new_parent_id: Option<NoteId>,
        target_index: Option<u32>,
    ) -> RepoResult<()>;
    /// Moves a note next to its parent; its following siblings become its
    /// trailing children.
    fn outdent_note(&self, id: NoteId) -> RepoResult<()>;
    /// Deletes one note and, by cascade, its descendants.
    fn delete_note(&self, id: NoteId) -> RepoResult<()>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn Connection,
    id_attempts: u32,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &[("notes", NOTE_COLUMNS)])?;
        Ok(Self {
            conn,
            id_attempts: DEFAULT_ID_ATTEMPTS,
        })
    }

    /// Overrides how many random identifiers are tried per insert.
    ///
    /// Values below one are raised to one.
    pub fn with_id_attempts(mut self, attempts: u32) -> Self {
        self.id_attempts = attempts.max(1);
        self
    }

    fn immediate_tx(&self) -> RepoResult<Transaction<'conn>> {
        Ok(Transaction::new_unchecked(
            self.conn,
            TransactionBehavior::Immediate,
        )?)
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn create_note(&self, draft: &NoteDraft) -> RepoResult<Note> {
        draft.validate()?;
        let started_at = Instant::now();

        let result = self.insert_in_tx(draft);
        match &result {
            Ok(note) => debug!(
                "event=note_create module=repo status=ok owner_id={} number={} position={} duration_ms={}",
                note.owner_id,
                note.number,
                note.position,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=note_create module=repo status=error owner_id={} duration_ms={} error={}",
                draft.owner_id,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn get_note(&self, id: NoteId) -> RepoResult<Option<Note>> {
        load_note(self.conn, id)
    }

    fn get_note_by_number(&self, owner_id: UserId, number: u32) -> RepoResult<Option<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE owner_id = ?1
               AND number = ?2;"
        ))?;
        let mut rows = stmt.query(params![owner_id, number])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_note_row(row)?));
        }
        Ok(None)
    }

    fn list_children(&self, parent_id: NoteId) -> RepoResult<Vec<Note>> {
        ensure_note_exists(self.conn, parent_id)?;
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE parent_id = ?1
             ORDER BY position ASC, id ASC;"
        ))?;
        let rows = stmt.query([parent_id])?;
        collect_notes(rows)
    }

    fn root_notes(&self, owner_id: UserId) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE owner_id = ?1
               AND parent_id IS NULL
             ORDER BY position ASC, id ASC;"
        ))?;
        let rows = stmt.query([owner_id])?;
        collect_notes(rows)
    }

    fn list_owner_notes(&self, owner_id: UserId) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL}
             WHERE owner_id = ?1
             ORDER BY number ASC;"
        ))?;
        let rows = stmt.query([owner_id])?;
        collect_notes(rows)
    }

    fn next_child_position(&self, parent_id: NoteId) -> RepoResult<u32> {
        let owner_id = note_owner(self.conn, parent_id)?.ok_or(RepoError::NoteNotFound(parent_id))?;
        next_position_in_group(self.conn, owner_id, Some(parent_id))
    }

    fn next_root_position(&self, owner_id: UserId) -> RepoResult<u32> {
        next_position_in_group(self.conn, owner_id, None)
    }

    fn update_text(&self, id: NoteId, text: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET text = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, text],
        )?;
        ensure_changed(changed, id)
    }

    fn set_public(&self, id: NoteId, public: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET public = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, bool_to_int(public)],
        )?;
        ensure_changed(changed, id)
    }

    fn set_expanded(&self, id: NoteId, pane: Pane, expanded: bool) -> RepoResult<()> {
        let sql = match pane {
            Pane::Minor => {
                "UPDATE notes
                 SET expanded_in_minor_pane = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;"
            }
            Pane::Major => {
                "UPDATE notes
                 SET expanded_in_major_pane = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;"
            }
        };
        let changed = self.conn.execute(sql, params![id, bool_to_int(expanded)])?;
        ensure_changed(changed, id)
    }

    fn move_note(
        &self,
        id: NoteId,
        new_parent_id: Option<NoteId>,
        target_index: Option<u32>,
    ) -> RepoResult<()> {
        let tx = self.immediate_tx()?;
        let note = load_note(&tx, id)?.ok_or(RepoError::NoteNotFound(id))?;
        if let Some(parent_id) = new_parent_id {
            ensure_same_owner(&tx, parent_id, note.owner_id)?;
        }

        let mut sibling_ids = list_group_ids(&tx, note.owner_id, new_parent_id)?;
        sibling_ids.retain(|sibling| *sibling != id);
        let index = target_index
            .map_or(sibling_ids.len(), |value| value as usize)
            .min(sibling_ids.len());
        sibling_ids.insert(index, id);

        write_sibling_order(&tx, note.owner_id, new_parent_id, &sibling_ids)?;
        tx.commit()?;
        debug!(
            "event=note_move module=repo status=ok owner_id={} index={}",
            note.owner_id, index
        );
        Ok(())
    }

    fn outdent_note(&self, id: NoteId) -> RepoResult<()> {
        let tx = self.immediate_tx()?;
        let note = load_note(&tx, id)?.ok_or(RepoError::NoteNotFound(id))?;
        let parent_id = note.parent_id.ok_or(RepoError::RootLevelNote(id))?;
        let parent = load_note(&tx, parent_id)?.ok_or(RepoError::NoteNotFound(parent_id))?;

        let siblings = list_group_ids(&tx, note.owner_id, Some(parent_id))?;
        let split = siblings
            .iter()
            .position(|sibling| *sibling == id)
            .ok_or_else(|| {
                RepoError::InvalidData(format!("note {id} missing from its sibling group"))
            })?;
        let trailing = siblings[split + 1..].to_vec();

        let mut outer = list_group_ids(&tx, note.owner_id, parent.parent_id)?;
        let parent_index = outer
            .iter()
            .position(|sibling| *sibling == parent_id)
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "note {parent_id} missing from its sibling group"
                ))
            })?;
        outer.insert(parent_index + 1, id);
        write_sibling_order(&tx, note.owner_id, parent.parent_id, &outer)?;

        if !trailing.is_empty() {
            let mut children = list_group_ids(&tx, note.owner_id, Some(id))?;
            children.extend(trailing);
            write_sibling_order(&tx, note.owner_id, Some(id), &children)?;
        }

        tx.commit()?;
        debug!(
            "event=note_outdent module=repo status=ok owner_id={}",
            note.owner_id
        );
        Ok(())
    }

    fn delete_note(&self, id: NoteId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE id = ?1;", [id])?;
        ensure_changed(changed, id)
    }
}

impl SqliteNoteRepository<'_> {
    fn insert_in_tx(&self, draft: &NoteDraft) -> RepoResult<Note> {
        let tx = self.immediate_tx()?;

        if let Some(parent_id) = draft.parent_id {
            ensure_same_owner(&tx, parent_id, draft.owner_id)?;
        }
        let number = reserve_note_number(&tx, draft.owner_id)?;
        let id = match draft.id {
            Some(id) => id,
            None => draw_unique_id(&mut rand::thread_rng(), self.id_attempts, |candidate| {
                note_id_exists(&tx, candidate)
            })?
            .ok_or(RepoError::IdentifierExhausted {
                attempts: self.id_attempts,
            })?,
        };
        let position = match draft.placement {
            NotePlacement::Append => {
                i64::from(next_position_in_group(&tx, draft.owner_id, draft.parent_id)?)
            }
            NotePlacement::Exact(position) => i64::from(position),
            NotePlacement::Index(_) => lifted_base(&tx, draft.owner_id)?,
        };

        tx.execute(
            "INSERT INTO notes (
                id,
                owner_id,
                parent_id,
                position,
                number,
                text,
                public,
                expanded_in_minor_pane,
                expanded_in_major_pane
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
            params![
                id,
                draft.owner_id,
                draft.parent_id,
                position,
                number,
                draft.text.as_str(),
                bool_to_int(draft.public),
                bool_to_int(draft.expanded_in_minor_pane),
                bool_to_int(draft.expanded_in_major_pane),
            ],
        )?;

        if let NotePlacement::Index(index) = draft.placement {
            let mut sibling_ids = list_group_ids(&tx, draft.owner_id, draft.parent_id)?;
            sibling_ids.retain(|sibling| *sibling != id);
            let index = (index as usize).min(sibling_ids.len());
            sibling_ids.insert(index, id);
            write_sibling_order(&tx, draft.owner_id, draft.parent_id, &sibling_ids)?;
        }

        let note = load_note(&tx, id)?.ok_or(RepoError::NoteNotFound(id))?;
        tx.commit()?;
        Ok(note)
    }
}

/// `max(number) + 1` over the owner's notes, or `0`.
pub(crate) fn scan_next_note_number(conn: &Connection, owner_id: UserId) -> RepoResult<u32> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(number) FROM notes WHERE owner_id = ?1;",
        [owner_id],
        |row| row.get(0),
    )?;
    let max = max.map(|value| to_u32(value, "notes.number")).transpose()?;
    next_after(max).ok_or_else(|| RepoError::InvalidData("notes.number overflow".to_string()))
}

pub(crate) fn note_owner(conn: &Connection, id: NoteId) -> RepoResult<Option<UserId>> {
    Ok(conn
        .query_row("SELECT owner_id FROM notes WHERE id = ?1;", [id], |row| {
            row.get(0)
        })
        .optional()?)
}

pub(crate) fn collect_notes(mut rows: rusqlite::Rows<'_>) -> RepoResult<Vec<Note>> {
    let mut notes = Vec::new();
    while let Some(row) = rows.next()? {
        notes.push(parse_note_row(row)?);
    }
    Ok(notes)
}

fn reserve_note_number(conn: &Connection, owner_id: UserId) -> RepoResult<u32> {
    let counter: Option<i64> = conn
        .query_row(
            "SELECT note_counter FROM user_profiles WHERE user_id = ?1;",
            [owner_id],
            |row| row.get(0),
        )
        .optional()?;
    let counter = to_u32(
        counter.ok_or(RepoError::UserNotFound(owner_id))?,
        "user_profiles.note_counter",
    )?;
    let scanned_next = scan_next_note_number(conn, owner_id)?;
    let (number, next_counter) = reserve_number(counter, scanned_next)
        .ok_or_else(|| RepoError::InvalidData("note number space exhausted".to_string()))?;

    conn.execute(
        "UPDATE user_profiles SET note_counter = ?2 WHERE user_id = ?1;",
        params![owner_id, next_counter],
    )?;
    Ok(number)
}

fn next_position_in_group(
    conn: &Connection,
    owner_id: UserId,
    parent_id: Option<NoteId>,
) -> RepoResult<u32> {
    let max: Option<i64> = match parent_id {
        Some(parent_id) => conn.query_row(
            "SELECT MAX(position) FROM notes WHERE parent_id = ?1;",
            [parent_id],
            |row| row.get(0),
        )?,
        None => conn.query_row(
            "SELECT MAX(position)
             FROM notes
             WHERE owner_id = ?1
               AND parent_id IS NULL;",
            [owner_id],
            |row| row.get(0),
        )?,
    };
    let max = max.map(|value| to_u32(value, "notes.position")).transpose()?;
    next_after(max).ok_or_else(|| RepoError::InvalidData("notes.position overflow".to_string()))
}

/// First position above every position the owner currently uses.
fn lifted_base(conn: &Connection, owner_id: UserId) -> RepoResult<i64> {
    Ok(conn.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM notes WHERE owner_id = ?1;",
        [owner_id],
        |row| row.get(0),
    )?)
}

fn list_group_ids(
    conn: &Connection,
    owner_id: UserId,
    parent_id: Option<NoteId>,
) -> RepoResult<Vec<NoteId>> {
    let mut ids = Vec::new();
    match parent_id {
        Some(parent_id) => {
            let mut stmt = conn.prepare(
                "SELECT id
                 FROM notes
                 WHERE parent_id = ?1
                 ORDER BY position ASC, id ASC;",
            )?;
            let mut rows = stmt.query([parent_id])?;
            while let Some(row) = rows.next()? {
                ids.push(row.get(0)?);
            }
        }
        None => {
            let mut stmt = conn.prepare(
                "SELECT id
                 FROM notes
                 WHERE owner_id = ?1
                   AND parent_id IS NULL
                 ORDER BY position ASC, id ASC;",
            )?;
            let mut rows = stmt.query([owner_id])?;
            while let Some(row) = rows.next()? {
                ids.push(row.get(0)?);
            }
        }
    }
    Ok(ids)
}

/// Writes `ids` as the complete, ordered child list of `parent_id`.
///
/// `ids` must contain every note that will sit under `parent_id` afterwards.
fn write_sibling_order(
    conn: &Connection,
    owner_id: UserId,
    parent_id: Option<NoteId>,
    ids: &[NoteId],
) -> RepoResult<()> {
    let base = lifted_base(conn, owner_id)?;
    for (offset, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE notes
             SET parent_id = ?2,
                 position = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id, parent_id, base + offset as i64],
        )?;
    }
    for (index, id) in ids.iter().enumerate() {
        conn.execute(
            "UPDATE notes SET position = ?2 WHERE id = ?1;",
            params![id, index as i64],
        )?;
    }
    Ok(())
}

fn ensure_same_owner(conn: &Connection, parent_id: NoteId, owner_id: UserId) -> RepoResult<()> {
    let actual_owner = note_owner(conn, parent_id)?.ok_or(RepoError::NoteNotFound(parent_id))?;
    if actual_owner != owner_id {
        return Err(RepoError::OwnerMismatch {
            parent_id,
            expected_owner: owner_id,
            actual_owner,
        });
    }
    Ok(())
}

fn ensure_note_exists(conn: &Connection, id: NoteId) -> RepoResult<()> {
    if note_id_exists(conn, id)? {
        Ok(())
    } else {
        Err(RepoError::NoteNotFound(id))
    }
}

fn note_id_exists(conn: &Connection, id: NoteId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM notes WHERE id = ?1);",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn load_note(conn: &Connection, id: NoteId) -> RepoResult<Option<Note>> {
    let mut stmt = conn.prepare(&format!("{NOTE_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_note_row(row)?));
    }
    Ok(None)
}

fn ensure_changed(changed: usize, id: NoteId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NoteNotFound(id));
    }
    Ok(())
}

pub(crate) fn parse_note_row(row: &Row<'_>) -> RepoResult<Note> {
    Ok(Note {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        parent_id: row.get("parent_id")?,
        position: to_u32(row.get("position")?, "notes.position")?,
        number: to_u32(row.get("number")?, "notes.number")?,
        text: row.get("text")?,
        public: int_to_bool(row.get("public")?, "notes.public")?,
        expanded_in_minor_pane: int_to_bool(
            row.get("expanded_in_minor_pane")?,
            "notes.expanded_in_minor_pane",
        )?,
        expanded_in_major_pane: int_to_bool(
            row.get("expanded_in_major_pane")?,
            "notes.expanded_in_major_pane",
        )?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn to_u32(value: i64, column: &'static str) -> RepoResult<u32> {
    u32::try_from(value)
        .map_err(|_| RepoError::InvalidData(format!("value `{value}` out of range in {column}")))
}

pub(crate) fn int_to_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
