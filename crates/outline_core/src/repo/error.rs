//! Repository error types.
//!
//! # Invariants
//! - SQLite constraint failures are classified into [`IntegrityViolation`]
//!   at conversion time; other SQLite errors stay transport errors.
//! - Integrity errors are reported as-is; nothing here retries.

use crate::db::DbError;
use crate::model::note::{NoteId, NoteValidationError, UserId};
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Storage-enforced uniqueness or reference constraint that rejected a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityViolation {
    /// Another note already holds this (parent, position) slot.
    SiblingPosition,
    /// Another note of the same owner already holds this number.
    NoteNumber,
    /// Another note already uses this identifier.
    Identifier,
    /// Username already registered.
    Username,
    /// Referenced user or note does not exist.
    MissingReference,
    /// Any other constraint, with SQLite's message.
    Other(String),
}

impl Display for IntegrityViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SiblingPosition => write!(f, "sibling position already taken"),
            Self::NoteNumber => write!(f, "note number already taken for owner"),
            Self::Identifier => write!(f, "note identifier already taken"),
            Self::Username => write!(f, "username already taken"),
            Self::MissingReference => write!(f, "referenced row does not exist"),
            Self::Other(message) => write!(f, "constraint failed: {message}"),
        }
    }
}

/// Errors from note and profile repository operations.
#[derive(Debug)]
pub enum RepoError {
    /// Draft failed local validation before reaching SQL.
    Validation(NoteValidationError),
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Write rejected by a storage constraint.
    Integrity(IntegrityViolation),
    NoteNotFound(NoteId),
    UserNotFound(UserId),
    /// Note would end up under a parent owned by a different user.
    OwnerMismatch {
        parent_id: NoteId,
        expected_owner: UserId,
        actual_owner: UserId,
    },
    /// Operation needs a parent but the note is root-level.
    RootLevelNote(NoteId),
    /// Every drawn identifier candidate was already taken.
    IdentifierExhausted { attempts: u32 },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Integrity(violation) => write!(f, "integrity error: {violation}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::OwnerMismatch {
                parent_id,
                expected_owner,
                actual_owner,
            } => write!(
                f,
                "parent note {parent_id} belongs to user {actual_owner}, not {expected_owner}"
            ),
            Self::RootLevelNote(id) => write!(f, "note {id} is already at root level"),
            Self::IdentifierExhausted { attempts } => {
                write!(f, "no free note identifier after {attempts} attempts")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "outline repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "outline repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "outline repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl RepoError {
    /// Returns the violated constraint when this is an integrity error.
    pub fn integrity_violation(&self) -> Option<&IntegrityViolation> {
        match self {
            Self::Integrity(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match classify_constraint(&value) {
            Some(violation) => Self::Integrity(violation),
            None => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Maps a SQLite constraint failure onto the outline's named constraints.
///
/// Unique-index messages list the indexed columns
/// (`UNIQUE constraint failed: notes.owner_id, notes.number`), which is what
/// tells the two position indexes apart from the number index.
pub(crate) fn classify_constraint(err: &rusqlite::Error) -> Option<IntegrityViolation> {
    let rusqlite::Error::SqliteFailure(failure, message) = err else {
        return None;
    };
    if failure.code != ErrorCode::ConstraintViolation {
        return None;
    }

    let message = message.as_deref().unwrap_or_default();
    let violation = match failure.extended_code {
        rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY => IntegrityViolation::MissingReference,
        rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE => {
            if message.contains("notes.position") {
                IntegrityViolation::SiblingPosition
            } else if message.contains("notes.number") {
                IntegrityViolation::NoteNumber
            } else if message.contains("notes.id") {
                IntegrityViolation::Identifier
            } else if message.contains("users.username") {
                IntegrityViolation::Username
            } else {
                IntegrityViolation::Other(message.to_string())
            }
        }
        _ => IntegrityViolation::Other(message.to_string()),
    };
    Some(violation)
}

#[cfg(test)]
mod tests {
    use super::{classify_constraint, IntegrityViolation};
    use rusqlite::Connection;

    fn failing_insert(setup: &str, insert: &str) -> rusqlite::Error {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(setup).unwrap();
        conn.execute_batch(insert).unwrap_err()
    }

    #[test]
    fn unique_index_columns_select_the_violation() {
        let err = failing_insert(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, owner_id INTEGER, number INTEGER);
             CREATE UNIQUE INDEX idx ON notes(owner_id, number);
             INSERT INTO notes VALUES (1, 1, 0);",
            "INSERT INTO notes VALUES (2, 1, 0);",
        );
        assert_eq!(
            classify_constraint(&err),
            Some(IntegrityViolation::NoteNumber)
        );
    }

    #[test]
    fn duplicate_rowid_is_identifier_violation() {
        let err = failing_insert(
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, text TEXT);
             INSERT INTO notes VALUES (5, 'a');",
            "INSERT INTO notes VALUES (5, 'b');",
        );
        assert_eq!(
            classify_constraint(&err),
            Some(IntegrityViolation::Identifier)
        );
    }

    #[test]
    fn non_constraint_errors_are_not_classified() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute_batch("SELECT * FROM missing_table;").unwrap_err();
        assert_eq!(classify_constraint(&err), None);
    }
}
