//! User profile use-case service.
//!
//! # Responsibility
//! - Register users with validated usernames.
//! - Read and update per-user settings and numbering state.
//!
//! # Invariants
//! - Usernames are 1-150 chars of letters, digits and `@ . + - _`.
//! - Focusing a note owned by someone else is accepted but logged.

use crate::model::note::{NoteId, UserId};
use crate::model::profile::UserProfile;
use crate::repo::error::RepoError;
use crate::repo::profile_repo::ProfileRepository;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]{1,150}$").expect("valid username regex"));

/// Errors from profile service operations.
#[derive(Debug)]
pub enum ProfileServiceError {
    /// Username is empty or contains unsupported characters.
    InvalidUsername(String),
    /// Target user does not exist.
    UserNotFound(UserId),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for ProfileServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUsername(value) => write!(f, "invalid username: `{value}`"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ProfileServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ProfileServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::UserNotFound(id) => Self::UserNotFound(id),
            other => Self::Repo(other),
        }
    }
}

/// Profile service facade over a profile repository.
pub struct ProfileService<R: ProfileRepository> {
    repo: R,
}

impl<R: ProfileRepository> ProfileService<R> {
    /// Creates service from repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Registers one user and creates its profile.
    pub fn register_user(&self, username: &str) -> Result<UserProfile, ProfileServiceError> {
        let normalized = username.trim();
        if !USERNAME_RE.is_match(normalized) {
            return Err(ProfileServiceError::InvalidUsername(username.to_string()));
        }
        self.repo.create_user(normalized).map_err(Into::into)
    }

    /// Loads one profile, failing when the user does not exist.
    pub fn profile(&self, user_id: UserId) -> Result<UserProfile, ProfileServiceError> {
        self.repo
            .get_profile(user_id)?
            .ok_or(ProfileServiceError::UserNotFound(user_id))
    }

    /// Loads one profile by username.
    pub fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserProfile>, ProfileServiceError> {
        self.repo.find_profile(username.trim()).map_err(Into::into)
    }

    /// Next note number for this profile's user by scanning its notes.
    ///
    /// Advisory: creation reserves numbers through the stored counter, which
    /// can be ahead of this value after the top-numbered note is deleted.
    pub fn next_note_number(&self, profile: &UserProfile) -> Result<u32, ProfileServiceError> {
        self.repo
            .next_note_number(profile.user_id)
            .map_err(Into::into)
    }

    /// Sets or clears the focused note and returns the updated profile.
    pub fn focus_note(
        &self,
        user_id: UserId,
        note_id: Option<NoteId>,
    ) -> Result<UserProfile, ProfileServiceError> {
        if let Some(note_id) = note_id {
            if let Some(owner_id) = self.repo.note_owner(note_id)? {
                if owner_id != user_id {
                    warn!(
                        "event=focus_note module=service status=warn reason=foreign_note user_id={} owner_id={}",
                        user_id, owner_id
                    );
                }
            }
        }
        self.repo.set_focused_note(user_id, note_id)?;
        self.profile(user_id)
    }

    /// Sets the spellcheck preference and returns the updated profile.
    pub fn set_spellcheck(
        &self,
        user_id: UserId,
        enabled: bool,
    ) -> Result<UserProfile, ProfileServiceError> {
        self.repo.set_spellcheck(user_id, enabled)?;
        self.profile(user_id)
    }
}
