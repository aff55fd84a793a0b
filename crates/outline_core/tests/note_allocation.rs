use outline_core::db::{open_db, open_db_in_memory};
use outline_core::{
    IntegrityViolation, NoteDraft, NotePlacement, NoteRepository, OutlineConfig,
    ProfileRepository, RepoError, SqliteNoteRepository, SqliteProfileRepository, UserId,
};
use rusqlite::Connection;
use std::collections::HashSet;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn create_user(conn: &Connection, username: &str) -> UserId {
    SqliteProfileRepository::try_new(conn)
        .unwrap()
        .create_user(username)
        .unwrap()
        .user_id
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteNoteRepository::try_new(&conn).err().unwrap();
    assert!(matches!(err, RepoError::UninitializedConnection { .. }));
}

#[test]
fn appended_children_take_next_free_position() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let parent = repo.create_note(&NoteDraft::root(owner, "parent")).unwrap();
    assert_eq!(repo.next_child_position(parent.id).unwrap(), 0);

    let positions: Vec<u32> = (0..3)
        .map(|index| {
            repo.create_note(&NoteDraft::child(owner, parent.id, format!("child {index}")))
                .unwrap()
                .position
        })
        .collect();
    assert_eq!(positions, vec![0, 1, 2]);
    assert_eq!(repo.next_child_position(parent.id).unwrap(), 3);
}

#[test]
fn next_position_follows_max_not_count() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let parent = repo.create_note(&NoteDraft::root(owner, "parent")).unwrap();
    repo.create_note(&NoteDraft::child(owner, parent.id, "a").at_position(0))
        .unwrap();
    repo.create_note(&NoteDraft::child(owner, parent.id, "b").at_position(7))
        .unwrap();

    assert_eq!(repo.next_child_position(parent.id).unwrap(), 8);
    let appended = repo
        .create_note(&NoteDraft::child(owner, parent.id, "c"))
        .unwrap();
    assert_eq!(appended.position, 8);
}

#[test]
fn next_child_position_of_unknown_note_is_not_found() {
    let conn = setup();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    assert!(matches!(
        repo.next_child_position(12345),
        Err(RepoError::NoteNotFound(12345))
    ));
}

#[test]
fn root_positions_are_scoped_per_owner() {
    let conn = setup();
    let ada = create_user(&conn, "ada");
    let bob = create_user(&conn, "bob");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    assert_eq!(repo.next_root_position(ada).unwrap(), 0);
    let first_ada = repo.create_note(&NoteDraft::root(ada, "a0")).unwrap();
    let second_ada = repo.create_note(&NoteDraft::root(ada, "a1")).unwrap();
    let first_bob = repo.create_note(&NoteDraft::root(bob, "b0")).unwrap();

    assert_eq!(first_ada.position, 0);
    assert_eq!(second_ada.position, 1);
    assert_eq!(first_bob.position, 0);
    assert_eq!(repo.next_root_position(ada).unwrap(), 2);
    assert_eq!(repo.next_root_position(bob).unwrap(), 1);
}

#[test]
fn duplicate_exact_position_is_an_integrity_error() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let parent = repo.create_note(&NoteDraft::root(owner, "parent")).unwrap();
    repo.create_note(&NoteDraft::child(owner, parent.id, "first").at_position(1))
        .unwrap();

    let err = repo
        .create_note(&NoteDraft::child(owner, parent.id, "clash").at_position(1))
        .unwrap_err();
    assert_eq!(
        err.integrity_violation(),
        Some(&IntegrityViolation::SiblingPosition)
    );

    let err = repo
        .create_note(&NoteDraft::root(owner, "root clash").at_position(0))
        .unwrap_err();
    assert_eq!(
        err.integrity_violation(),
        Some(&IntegrityViolation::SiblingPosition)
    );
}

#[test]
fn failed_insert_does_not_consume_a_number() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let profiles = SqliteProfileRepository::try_new(&conn).unwrap();

    repo.create_note(&NoteDraft::root(owner, "n0")).unwrap();
    let counter_before = profiles.get_profile(owner).unwrap().unwrap().note_counter;

    repo.create_note(&NoteDraft::root(owner, "clash").at_position(0))
        .unwrap_err();

    let counter_after = profiles.get_profile(owner).unwrap().unwrap().note_counter;
    assert_eq!(counter_before, counter_after);
    let next = repo.create_note(&NoteDraft::root(owner, "n1")).unwrap();
    assert_eq!(next.number, 1);
}

#[test]
fn numbers_are_per_owner_and_sequential() {
    let conn = setup();
    let ada = create_user(&conn, "ada");
    let bob = create_user(&conn, "bob");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let profiles = SqliteProfileRepository::try_new(&conn).unwrap();

    assert_eq!(profiles.next_note_number(ada).unwrap(), 0);

    let root = repo.create_note(&NoteDraft::root(ada, "root")).unwrap();
    let child = repo
        .create_note(&NoteDraft::child(ada, root.id, "child"))
        .unwrap();
    let other = repo.create_note(&NoteDraft::root(bob, "bob root")).unwrap();

    assert_eq!(root.number, 0);
    assert_eq!(child.number, 1);
    assert_eq!(other.number, 0);
    assert_eq!(profiles.next_note_number(ada).unwrap(), 2);
    assert_eq!(profiles.next_note_number(bob).unwrap(), 1);

    let by_number = repo.get_note_by_number(ada, 1).unwrap().unwrap();
    assert_eq!(by_number.id, child.id);
    assert!(repo.get_note_by_number(bob, 1).unwrap().is_none());
}

#[test]
fn numbers_are_not_reused_after_deleting_the_highest() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let profiles = SqliteProfileRepository::try_new(&conn).unwrap();

    for index in 0..3 {
        repo.create_note(&NoteDraft::root(owner, format!("n{index}")))
            .unwrap();
    }
    let highest = repo.get_note_by_number(owner, 2).unwrap().unwrap();
    repo.delete_note(highest.id).unwrap();

    assert_eq!(profiles.next_note_number(owner).unwrap(), 2);
    let next = repo.create_note(&NoteDraft::root(owner, "n3")).unwrap();
    assert_eq!(next.number, 3);
}

#[test]
fn next_note_number_for_unknown_user_is_not_found() {
    let conn = setup();
    let profiles = SqliteProfileRepository::try_new(&conn).unwrap();
    assert!(matches!(
        profiles.next_note_number(404),
        Err(RepoError::UserNotFound(404))
    ));
}

#[test]
fn generated_identifiers_are_non_negative_and_distinct() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let mut seen = HashSet::new();
    for index in 0..50 {
        let note = repo
            .create_note(&NoteDraft::root(owner, format!("n{index}")))
            .unwrap();
        assert!(note.id >= 0);
        assert!(seen.insert(note.id));
    }
}

#[test]
fn supplied_identifier_is_kept_and_duplicates_rejected() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let note = repo
        .create_note(&NoteDraft::root(owner, "fixed").with_id(i64::MAX - 1))
        .unwrap();
    assert_eq!(note.id, i64::MAX - 1);

    let err = repo
        .create_note(&NoteDraft::root(owner, "again").with_id(i64::MAX - 1))
        .unwrap_err();
    assert_eq!(
        err.integrity_violation(),
        Some(&IntegrityViolation::Identifier)
    );
}

#[test]
fn negative_supplied_identifier_fails_validation() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let err = repo
        .create_note(&NoteDraft::root(owner, "bad").with_id(-1))
        .unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
}

#[test]
fn configured_id_attempts_still_allocate() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let config = OutlineConfig::from_toml_str("[store]\nid_max_attempts = 1\n").unwrap();
    let repo = SqliteNoteRepository::try_new(&conn)
        .unwrap()
        .with_id_attempts(config.store.id_max_attempts);

    let note = repo.create_note(&NoteDraft::root(owner, "single draw")).unwrap();
    assert!(note.id >= 0);
}

#[test]
fn child_under_foreign_parent_is_rejected() {
    let conn = setup();
    let ada = create_user(&conn, "ada");
    let bob = create_user(&conn, "bob");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let parent = repo.create_note(&NoteDraft::root(ada, "ada's")).unwrap();
    let err = repo
        .create_note(&NoteDraft::child(bob, parent.id, "intruder"))
        .unwrap_err();
    match err {
        RepoError::OwnerMismatch {
            parent_id,
            expected_owner,
            actual_owner,
        } => {
            assert_eq!(parent_id, parent.id);
            assert_eq!(expected_owner, bob);
            assert_eq!(actual_owner, ada);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn note_for_unknown_user_is_rejected() {
    let conn = setup();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    assert!(matches!(
        repo.create_note(&NoteDraft::root(77, "orphan")),
        Err(RepoError::UserNotFound(77))
    ));
}

#[test]
fn index_placement_shifts_later_siblings() {
    let conn = setup();
    let owner = create_user(&conn, "ada");
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();

    let a = repo.create_note(&NoteDraft::root(owner, "a")).unwrap();
    let c = repo.create_note(&NoteDraft::root(owner, "c")).unwrap();
    let b = repo
        .create_note(&NoteDraft::root(owner, "b").with_placement(NotePlacement::Index(1)))
        .unwrap();
    assert_eq!(b.position, 1);

    let roots = repo.root_notes(owner).unwrap();
    let order: Vec<_> = roots.iter().map(|note| (note.id, note.position)).collect();
    assert_eq!(order, vec![(a.id, 0), (b.id, 1), (c.id, 2)]);

    let tail = repo
        .create_note(&NoteDraft::root(owner, "tail").with_placement(NotePlacement::Index(99)))
        .unwrap();
    assert_eq!(tail.position, 3);
}

#[test]
fn concurrent_writers_never_share_a_slot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.sqlite3");

    let conn = open_db(&path).unwrap();
    let owner = create_user(&conn, "ada");
    drop(conn);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let path = path.clone();
            std::thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let repo = SqliteNoteRepository::try_new(&conn).unwrap();
                for index in 0..10 {
                    repo.create_note(&NoteDraft::root(owner, format!("w{worker}-{index}")))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let repo = SqliteNoteRepository::try_new(&conn).unwrap();
    let notes = repo.list_owner_notes(owner).unwrap();
    assert_eq!(notes.len(), 40);

    let numbers: HashSet<u32> = notes.iter().map(|note| note.number).collect();
    let positions: HashSet<u32> = notes.iter().map(|note| note.position).collect();
    assert_eq!(numbers, (0..40).collect());
    assert_eq!(positions, (0..40).collect());
}
