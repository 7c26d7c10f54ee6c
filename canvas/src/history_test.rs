use super::*;
use crate::doc::{Note, NoteKind};

fn snap_with(n: u32) -> BoardSnapshot {
    let notes = (0..n).map(|i| Note::new(NoteKind::Card, f64::from(i), 0.0)).collect();
    BoardSnapshot { notes, ..Default::default() }
}

#[test]
fn empty_history_is_noop() {
    let mut history = History::default();
    assert!(!history.can_undo());
    assert!(history.undo(BoardSnapshot::default()).is_none());
    assert!(history.redo(BoardSnapshot::default()).is_none());
    assert_eq!(history.redo_len(), 0);
}

#[test]
fn undo_returns_previous_and_stacks_current_for_redo() {
    let mut history = History::default();
    let s0 = snap_with(0);
    let s1 = snap_with(1);
    history.push(s0.clone());
    assert_eq!(history.undo(s1.clone()), Some(s0.clone()));
    assert!(history.can_redo());
    assert_eq!(history.redo(s0), Some(s1));
    assert!(history.can_undo());
    assert!(!history.can_redo());
}

#[test]
fn push_clears_future() {
    let mut history = History::default();
    history.push(snap_with(0));
    history.undo(snap_with(1));
    assert!(history.can_redo());
    history.push(snap_with(2));
    assert!(!history.can_redo());
}

#[test]
fn redo_order_is_nearest_first() {
    let mut history = History::default();
    let states: Vec<_> = (0..3).map(snap_with).collect();
    history.push(states[0].clone());
    history.push(states[1].clone());
    let mut live = states[2].clone();
    live = history.undo(live).unwrap();
    live = history.undo(live).unwrap();
    assert_eq!(live, states[0]);
    live = history.redo(live).unwrap();
    assert_eq!(live, states[1]);
    live = history.redo(live).unwrap();
    assert_eq!(live, states[2]);
}

#[test]
fn depth_evicts_oldest() {
    let mut history = History::new(3);
    for i in 0..5 {
        history.push(snap_with(i));
    }
    assert_eq!(history.undo_len(), 3);
    let mut live = snap_with(5);
    let mut last = None;
    while let Some(prev) = history.undo(live.clone()) {
        last = Some(prev.clone());
        live = prev;
    }
    assert_eq!(last.unwrap().notes.len(), 2);
}

#[test]
fn default_depth_is_fifty() {
    let mut history = History::default();
    for _ in 0..60 {
        history.push(BoardSnapshot::default());
    }
    assert_eq!(history.undo_len(), 50);
}

#[test]
fn zero_depth_still_keeps_one_step() {
    let mut history = History::new(0);
    history.push(snap_with(1));
    history.push(snap_with(2));
    assert_eq!(history.undo_len(), 1);
}
