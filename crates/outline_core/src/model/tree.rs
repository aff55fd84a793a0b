//! Nested view of one owner's note forest.
//!
//! # Invariants
//! - Building, sizing and dropping a tree never recurse per nesting level,
//!   so outline depth is bounded by memory, not by the call stack.
//! - `Serialize` output is nested and does recurse per level.

use crate::model::note::{Note, NoteId};
use serde::Serialize;
use std::collections::HashMap;

/// One note with its children in display order.
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct NoteTreeNode {
    #[serde(flatten)]
    pub note: Note,
    pub children: Vec<NoteTreeNode>,
}

impl NoteTreeNode {
    /// Number of notes in this subtree, including the root.
    pub fn subtree_size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            count += 1;
            pending.extend(node.children.iter());
        }
        count
    }

    /// Number of levels in this subtree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((node, level)) = pending.pop() {
            deepest = deepest.max(level);
            pending.extend(node.children.iter().map(|child| (child, level + 1)));
        }
        deepest
    }
}

impl Drop for NoteTreeNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// Builds the forest rooted at notes without a parent.
///
/// Siblings are ordered by `position`, then `id`. Notes whose parent is not
/// part of `notes` are unreachable and left out.
pub fn build_forest(notes: Vec<Note>) -> Vec<NoteTreeNode> {
    let mut by_parent: HashMap<Option<NoteId>, Vec<Note>> = HashMap::new();
    for note in notes {
        by_parent.entry(note.parent_id).or_default().push(note);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|note| (note.position, note.id));
    }

    // Parents precede their children; siblings keep display order.
    let mut reachable = Vec::new();
    let mut frontier = vec![None];
    while let Some(parent_id) = frontier.pop() {
        if let Some(siblings) = by_parent.remove(&parent_id) {
            frontier.extend(siblings.iter().map(|note| Some(note.id)));
            reachable.extend(siblings);
        }
    }

    // Walking backwards finishes every subtree before its parent is visited.
    let mut finished: HashMap<Option<NoteId>, Vec<NoteTreeNode>> = HashMap::new();
    for note in reachable.into_iter().rev() {
        let mut children = finished.remove(&Some(note.id)).unwrap_or_default();
        children.reverse();
        finished
            .entry(note.parent_id)
            .or_default()
            .push(NoteTreeNode { note, children });
    }

    let mut roots = finished.remove(&None).unwrap_or_default();
    roots.reverse();
    roots
}

#[cfg(test)]
mod tests {
    use super::build_forest;
    use crate::model::note::Note;

    fn note(id: i64, parent_id: Option<i64>, position: u32) -> Note {
        Note {
            id,
            owner_id: 1,
            parent_id,
            position,
            number: id as u32,
            text: format!("note {id}"),
            public: false,
            expanded_in_minor_pane: false,
            expanded_in_major_pane: true,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn forest_orders_siblings_by_position() {
        let forest = build_forest(vec![
            note(10, None, 1),
            note(11, None, 0),
            note(12, Some(10), 5),
            note(13, Some(10), 2),
        ]);

        assert_eq!(forest.len(), 2);
        assert_eq!(forest[0].note.id, 11);
        assert_eq!(forest[1].note.id, 10);
        let child_ids: Vec<i64> = forest[1].children.iter().map(|c| c.note.id).collect();
        assert_eq!(child_ids, vec![13, 12]);
        assert_eq!(forest[1].subtree_size(), 3);
    }

    #[test]
    fn nested_levels_keep_their_own_order() {
        let forest = build_forest(vec![
            note(1, None, 0),
            note(2, Some(1), 1),
            note(3, Some(1), 0),
            note(4, Some(2), 0),
            note(5, Some(3), 0),
            note(6, None, 1),
        ]);

        assert_eq!(forest.len(), 2);
        let first = &forest[0];
        let child_ids: Vec<i64> = first.children.iter().map(|c| c.note.id).collect();
        assert_eq!(child_ids, vec![3, 2]);
        assert_eq!(first.children[0].children[0].note.id, 5);
        assert_eq!(first.children[1].children[0].note.id, 4);
        assert_eq!(first.depth(), 3);
        assert_eq!(forest[1].depth(), 1);
    }

    #[test]
    fn very_deep_chain_builds_and_drops() {
        let depth = 200_000;
        let mut notes = vec![note(0, None, 0)];
        notes.extend((1..depth).map(|id| note(id, Some(id - 1), 0)));

        let forest = build_forest(notes);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].subtree_size(), depth as usize);
        assert_eq!(forest[0].depth(), depth as usize);
    }

    #[test]
    fn orphaned_notes_are_left_out() {
        let forest = build_forest(vec![note(1, None, 0), note(2, Some(99), 0)]);
        assert_eq!(forest.len(), 1);
        assert!(forest[0].children.is_empty());
    }
}
