//! Allocation rules for note identifiers, positions and numbers.
//!
//! # Responsibility
//! - Draw random note identifiers.
//! - Compute "next after max" values for positions and numbers.
//! - Combine the stored per-user counter with the scanned maximum.
//!
//! # Invariants
//! - Identifiers lie in `[0, i64::MAX)`.
//! - Functions here are storage-agnostic; repositories supply the reads and
//!   run them inside their write transaction.

use crate::model::note::NoteId;
use rand::Rng;

/// Exclusive upper bound of the identifier space (`2^63 - 1`).
pub const NOTE_ID_UPPER_BOUND: NoteId = i64::MAX;

/// Default number of candidates drawn before giving up on a fresh id.
pub const DEFAULT_ID_ATTEMPTS: u32 = 8;

/// Draws one identifier from the thread-local RNG.
///
/// No collision check happens here; see [`draw_unique_id`].
pub fn generate_note_id() -> NoteId {
    generate_note_id_with(&mut rand::thread_rng())
}

/// Draws one identifier from the given RNG.
pub fn generate_note_id_with<R: Rng + ?Sized>(rng: &mut R) -> NoteId {
    rng.gen_range(0..NOTE_ID_UPPER_BOUND)
}

/// Draws identifiers until `is_taken` reports a free one.
///
/// Returns `Ok(None)` when every one of `attempts` candidates was taken.
pub fn draw_unique_id<R, E>(
    rng: &mut R,
    attempts: u32,
    mut is_taken: impl FnMut(NoteId) -> Result<bool, E>,
) -> Result<Option<NoteId>, E>
where
    R: Rng + ?Sized,
{
    for _ in 0..attempts {
        let candidate = generate_note_id_with(rng);
        if !is_taken(candidate)? {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Returns `max + 1`, or `0` when there is no existing value.
///
/// `None` is returned only when `max + 1` overflows.
pub fn next_after(max: Option<u32>) -> Option<u32> {
    match max {
        None => Some(0),
        Some(value) => value.checked_add(1),
    }
}

/// Picks the number for a new note and the counter value to store back.
///
/// `scanned_next` is `max(number) + 1` over the owner's live notes. Taking the
/// larger of the two keeps numbers unique even if rows were written without
/// going through the counter, and keeps them increasing after deletes.
pub fn reserve_number(counter: u32, scanned_next: u32) -> Option<(u32, u32)> {
    let number = counter.max(scanned_next);
    Some((number, number.checked_add(1)?))
}
