//! User and profile repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Create users together with their single profile row.
//! - Expose the scanned "next note number" read.
//! - Persist profile settings (focused note, spellcheck).
//!
//! # Invariants
//! - A user row and its profile row are inserted in the same transaction.
//! - `focused_note_id` only has to reference an existing note; ownership is
//!   not checked here.

use crate::model::note::{NoteId, UserId};
use crate::model::profile::UserProfile;
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::note_repo::{
    bool_to_int, int_to_bool, note_owner, scan_next_note_number, to_u32,
};
use crate::repo::schema::ensure_connection_ready;
use log::info;
use rusqlite::{params, Connection, Row, Transaction, TransactionBehavior};

const PROFILE_SELECT_SQL: &str = "SELECT
    p.user_id AS user_id,
    u.username AS username,
    p.focused_note_id AS focused_note_id,
    p.spellcheck AS spellcheck,
    p.note_counter AS note_counter
FROM user_profiles p
INNER JOIN users u ON u.id = p.user_id";

const USER_COLUMNS: &[&str] = &["id", "username", "created_at"];
const PROFILE_COLUMNS: &[&str] = &["user_id", "focused_note_id", "spellcheck", "note_counter"];

/// Repository interface for users and their profiles.
pub trait ProfileRepository {
    /// Inserts one user and its profile.
    fn create_user(&self, username: &str) -> RepoResult<UserProfile>;
    /// Loads one profile by user id.
    fn get_profile(&self, user_id: UserId) -> RepoResult<Option<UserProfile>>;
    /// Loads one profile by exact username.
    fn find_profile(&self, username: &str) -> RepoResult<Option<UserProfile>>;
    /// `max(number) + 1` over the user's notes, or `0` without notes.
    fn next_note_number(&self, user_id: UserId) -> RepoResult<u32>;
    /// Sets or clears the focused note.
    fn set_focused_note(&self, user_id: UserId, note_id: Option<NoteId>) -> RepoResult<()>;
    /// Sets the spellcheck preference.
    fn set_spellcheck(&self, user_id: UserId, enabled: bool) -> RepoResult<()>;
    /// Returns the owner of one note, if the note exists.
    fn note_owner(&self, note_id: NoteId) -> RepoResult<Option<UserId>>;
}

/// SQLite-backed profile repository.
pub struct SqliteProfileRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteProfileRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(
            conn,
            &[("users", USER_COLUMNS), ("user_profiles", PROFILE_COLUMNS)],
        )?;
        Ok(Self { conn })
    }
}

impl ProfileRepository for SqliteProfileRepository<'_> {
    fn create_user(&self, username: &str) -> RepoResult<UserProfile> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute("INSERT INTO users (username) VALUES (?1);", [username])?;
        let user_id = tx.last_insert_rowid();
        tx.execute(
            "INSERT INTO user_profiles (user_id) VALUES (?1);",
            [user_id],
        )?;
        tx.commit()?;

        info!("event=user_create module=repo status=ok user_id={user_id}");
        self.get_profile(user_id)?
            .ok_or(RepoError::UserNotFound(user_id))
    }

    fn get_profile(&self, user_id: UserId) -> RepoResult<Option<UserProfile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROFILE_SELECT_SQL} WHERE p.user_id = ?1;"))?;
        let mut rows = stmt.query([user_id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_profile_row(row)?));
        }
        Ok(None)
    }

    fn find_profile(&self, username: &str) -> RepoResult<Option<UserProfile>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROFILE_SELECT_SQL} WHERE u.username = ?1;"))?;
        let mut rows = stmt.query([username])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_profile_row(row)?));
        }
        Ok(None)
    }

    fn next_note_number(&self, user_id: UserId) -> RepoResult<u32> {
        if self.get_profile(user_id)?.is_none() {
            return Err(RepoError::UserNotFound(user_id));
        }
        scan_next_note_number(self.conn, user_id)
    }

    fn set_focused_note(&self, user_id: UserId, note_id: Option<NoteId>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE user_profiles SET focused_note_id = ?2 WHERE user_id = ?1;",
            params![user_id, note_id],
        )?;
        if changed == 0 {
            return Err(RepoError::UserNotFound(user_id));
        }
        Ok(())
    }

    fn set_spellcheck(&self, user_id: UserId, enabled: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE user_profiles SET spellcheck = ?2 WHERE user_id = ?1;",
            params![user_id, bool_to_int(enabled)],
        )?;
        if changed == 0 {
            return Err(RepoError::UserNotFound(user_id));
        }
        Ok(())
    }

    fn note_owner(&self, note_id: NoteId) -> RepoResult<Option<UserId>> {
        note_owner(self.conn, note_id)
    }
}

fn parse_profile_row(row: &Row<'_>) -> RepoResult<UserProfile> {
    Ok(UserProfile {
        user_id: row.get("user_id")?,
        username: row.get("username")?,
        focused_note_id: row.get("focused_note_id")?,
        spellcheck: int_to_bool(row.get("spellcheck")?, "user_profiles.spellcheck")?,
        note_counter: to_u32(row.get("note_counter")?, "user_profiles.note_counter")?,
    })
}
