//! Review actions: keep/undo, navigation, whole-session accept/reject,
//! snapshots and undo/redo.

mod common;

use std::sync::Arc;

use common::*;
use tensaku_engine::{EngineConfig, EntryTag, Reconciler, ReviewState, SessionEvent};
use tensaku_types::{CellEdit, DocumentUri, TextEdit};

// ============================================================================
// Keep / undo per entry
// ============================================================================

#[tokio::test]
async fn test_keep_inserted_copies_into_original() {
    let mut engine = agent_session().await;
    let d = engine.entries()[2].cell;

    assert!(engine.keep_entry(d).unwrap());
    assert_eq!(sources(engine.original()), vec!["a = 1\n", "b = 2\n", "d = 4\n", "c = 3\n"]);
    assert_eq!(engine.entry_for(d).unwrap().tag(), EntryTag::Unchanged);
    assert_eq!(engine.change_count(), 1);

    // Already settled.
    assert!(!engine.keep_entry(d).unwrap());
    assert_eq!(engine.original().len(), 4);
}

#[tokio::test]
async fn test_undo_inserted_removes_cell_and_tracker() {
    let mut engine = agent_session().await;
    let d = engine.entries()[2].cell;
    let trackers = engine.tracker_count();

    assert!(engine.undo_entry(d).unwrap());
    assert_eq!(engine.modified().len(), 3);
    assert_eq!(engine.tracker_count(), trackers - 1);
    assert!(engine.entry_for(d).is_none());
    assert!(!engine.undo_entry(d).unwrap());
}

#[tokio::test]
async fn test_keep_and_undo_deletion() {
    let (mut engine, _, _) = clean_session().await;
    engine
        .apply_user_edits(vec![CellEdit::delete(0, 1)])
        .await
        .unwrap();
    let a = engine.original().cell(0).unwrap().id;

    // Undo puts the cell back where it was.
    assert!(engine.undo_entry(a).unwrap());
    assert_eq!(sources(engine.modified()), sources(engine.original()));
    assert_eq!(engine.change_count(), 0);

    engine
        .apply_user_edits(vec![CellEdit::delete(0, 1)])
        .await
        .unwrap();
    assert!(engine.keep_entry(a).unwrap());
    assert_eq!(sources(engine.original()), vec!["b = 2\n", "c = 3\n"]);
    assert!(engine.entry_for(a).is_none());
    assert_eq!(engine.change_count(), 0);
}

#[tokio::test]
async fn test_keep_modified_commits_text() {
    let mut engine = agent_session().await;
    let b = engine.entries()[1].cell;

    assert!(engine.keep_entry(b).unwrap());
    assert_eq!(engine.original().cell(1).unwrap().source, "b = 20\n");
    assert_eq!(engine.entry_for(b).unwrap().tag(), EntryTag::Unchanged);
    assert!(!engine.keep_entry(b).unwrap());
}

#[tokio::test]
async fn test_undo_modified_reverts_text() {
    let mut engine = agent_session().await;
    let b = engine.entries()[1].cell;

    assert!(engine.undo_entry(b).unwrap());
    assert_eq!(engine.modified().cell(1).unwrap().source, "b = 2\n");
    assert_eq!(engine.original().cell(1).unwrap().source, "b = 2\n");
}

#[tokio::test]
async fn test_change_count_only_decreases_while_settling() {
    let mut engine = agent_session().await;
    engine
        .apply_user_edits(vec![CellEdit::delete(0, 1)])
        .await
        .unwrap();

    let mut last = engine.change_count();
    assert_eq!(last, 3);
    while let Some(pos) = engine.entries().iter().position(|e| e.change_count() > 0) {
        assert!(engine.keep_cell(pos).unwrap());
        let now = engine.change_count();
        assert!(now < last, "{now} >= {last}");
        last = now;
    }
    assert_eq!(last, 0);
    assert!(engine.original().content_eq(engine.modified()));
}

#[tokio::test]
async fn test_keep_cell_out_of_range() {
    let (mut engine, _, _) = clean_session().await;
    assert!(engine.keep_cell(99).is_err());
    assert!(!engine.can_undo());
}

#[tokio::test]
async fn test_settled_entry_records_no_undo_step() {
    let mut engine = agent_session().await;
    assert!(!engine.keep_cell(0).unwrap());
    assert!(!engine.undo_cell(0).unwrap());
    assert!(!engine.can_undo());

    assert!(engine.keep_cell(2).unwrap());
    assert!(engine.undo_step().await);
    assert!(engine.can_redo());

    // A no-op keeps the redo stack.
    assert!(!engine.keep_cell(0).unwrap());
    assert!(engine.can_redo());
    let a = engine.entries()[0].cell;
    assert!(!engine.keep_change(a, 0).await.unwrap());
    assert!(engine.can_redo());
}

#[tokio::test]
async fn test_initialize_starts_fresh_history() {
    let mut engine = agent_session().await;
    assert!(engine.keep_cell(2).unwrap());
    assert!(engine.can_undo());

    engine.initialize(abc(), abc()).await;
    assert!(!engine.can_undo());
    assert!(!engine.can_redo());
}

#[tokio::test]
async fn test_keep_single_line_change() {
    let (mut engine, _, _) = clean_session().await;
    engine
        .apply_user_edits(vec![CellEdit::Content {
            index: 0,
            edits: vec![TextEdit::replace_all("a = 1\n", "a = 10\nmid\nz = 9\n")],
        }])
        .await
        .unwrap();
    let a = engine.entries()[0].cell;
    let before = engine.change_count();
    assert!(before >= 1);

    assert!(engine.keep_change(a, 0).await.unwrap());
    assert!(engine.change_count() < before);
}

// ============================================================================
// Navigation
// ============================================================================

#[tokio::test]
async fn test_next_and_previous_change() {
    let mut engine = agent_session().await;
    let b = engine.entries()[1].cell;
    let d = engine.entries()[2].cell;

    let first = engine.next_change(false).unwrap();
    assert_eq!((first.cell, first.change, first.flat), (b, Some(0), 0));
    let second = engine.next_change(false).unwrap();
    assert_eq!((second.cell, second.change, second.flat), (d, None, 1));

    assert!(engine.next_change(false).is_none());
    assert_eq!(engine.focused_change().unwrap().cell, d);
    assert_eq!(engine.next_change(true).unwrap().cell, b);

    assert_eq!(engine.previous_change(true).unwrap().cell, d);
    assert_eq!(engine.previous_change(false).unwrap().cell, b);
    assert!(engine.previous_change(false).is_none());
}

#[tokio::test]
async fn test_navigation_focuses_tracker() {
    let mut engine = agent_session().await;
    let b = engine.entries()[1].cell;

    engine.next_change(false);
    assert_eq!(engine.tracker(b).unwrap().focused(), Some(0));
    engine.next_change(false);
    assert_eq!(engine.tracker(b).unwrap().focused(), None);
}

#[tokio::test]
async fn test_reveal_emits_event() {
    let mut engine = agent_session().await;
    let d = engine.entries()[2].cell;
    let mut events = engine.subscribe();

    let focused = engine.reveal(d).unwrap();
    assert_eq!(focused.entry, 2);
    assert_eq!(
        events.try_recv().unwrap(),
        SessionEvent::Revealed {
            cell: d,
            entry: 2,
            change: None
        }
    );

    let a = engine.entries()[0].cell;
    assert!(engine.reveal(a).is_none());
}

#[tokio::test]
async fn test_accept_nearest_walks_every_change() {
    let mut engine = agent_session().await;
    let d = engine.entries()[2].cell;

    let next = engine.accept_nearest_change().await.unwrap().unwrap();
    assert_eq!(next.cell, d);
    assert_eq!(engine.change_count(), 1);

    assert!(engine.accept_nearest_change().await.unwrap().is_none());
    assert_eq!(engine.change_count(), 0);
    assert!(engine.original().content_eq(engine.modified()));
    assert!(engine.accept_nearest_change().await.unwrap().is_none());
}

#[tokio::test]
async fn test_reject_nearest_restores_original() {
    let mut engine = agent_session().await;
    engine.reject_nearest_change().await.unwrap();
    engine.reject_nearest_change().await.unwrap();

    assert_eq!(engine.change_count(), 0);
    assert_eq!(sources(engine.modified()), vec!["a = 1\n", "b = 2\n", "c = 3\n"]);
}

#[tokio::test]
async fn test_toggle_diff_view() {
    let (mut engine, _, _) = clean_session().await;
    assert!(engine.diff_view_enabled());
    assert!(!engine.toggle_diff_view());
    assert!(engine.toggle_diff_view());
}

// ============================================================================
// Whole session
// ============================================================================

#[tokio::test]
async fn test_accept_all_saves_and_rebaselines() {
    let mut engine = agent_session().await;

    engine.accept_all().await.unwrap();
    assert_eq!(engine.state(), ReviewState::Accepted);
    assert_eq!(engine.change_count(), 0);
    assert!(engine.original().content_eq(engine.modified()));
}

#[tokio::test]
async fn test_reject_all_deletes_newly_created_document() {
    let store = Arc::new(tensaku_engine::MemoryStore::new());
    let service = Arc::new(CountingService::default());
    let mut engine = Reconciler::open(URI, doc(&[]), service, store.clone(), EngineConfig::default())
        .await
        .unwrap();
    assert!(engine.is_newly_created());

    engine
        .apply_agent_edits(
            tensaku_engine::EditTarget::Document,
            vec![tensaku_engine::AgentEdit::Cell(CellEdit::insert(
                0,
                vec![tensaku_types::Cell::code("print('hi')\n")],
            ))],
            true,
        )
        .await
        .unwrap();
    assert_eq!(engine.change_count(), 1);

    engine.reject_all().await.unwrap();
    assert_eq!(engine.state(), ReviewState::Rejected);
    assert!(engine.modified().is_empty());
    assert!(!store.contains(&DocumentUri::from(URI)));
}

#[tokio::test]
async fn test_accept_all_persists_new_document() {
    let store = Arc::new(tensaku_engine::MemoryStore::new());
    let service = Arc::new(CountingService::default());
    let mut engine = Reconciler::open(URI, doc(&[]), service, store.clone(), EngineConfig::default())
        .await
        .unwrap();
    engine
        .apply_user_edits(vec![CellEdit::insert(0, vec![tensaku_types::Cell::code("x = 1\n")])])
        .await
        .unwrap();

    engine.accept_all().await.unwrap();
    assert!(!engine.is_newly_created());
    let saved = store.get(&DocumentUri::from(URI)).unwrap();
    assert_eq!(sources(&saved), vec!["x = 1\n"]);
}

#[tokio::test]
async fn test_open_resolves_existing_document() {
    let store = Arc::new(tensaku_engine::MemoryStore::new());
    store.insert(doc(&["a = 1\n", "b = 20\n", "c = 3\n"]));
    let service = Arc::new(CountingService::default());

    let engine = Reconciler::open(URI, abc(), service, store, EngineConfig::default())
        .await
        .unwrap();
    assert!(!engine.is_newly_created());
    assert_eq!(engine.change_count(), 1);
}

// ============================================================================
// Snapshots and undo/redo
// ============================================================================

#[tokio::test]
async fn test_snapshot_restores_into_fresh_engine() {
    let mut engine = agent_session().await;
    let blob = engine.create_snapshot().unwrap();
    assert_eq!(blob.locator.session, engine.session_id());
    assert!(engine.equals_snapshot(&blob).unwrap());

    let (mut fresh, _, _) = clean_session().await;
    assert!(!fresh.equals_snapshot(&blob).unwrap());
    fresh.restore_from_snapshot(&blob).await.unwrap();

    assert!(fresh.equals_snapshot(&blob).unwrap());
    assert_eq!(fresh.session_id(), engine.session_id());
    assert_eq!(fresh.change_count(), engine.change_count());
}

#[tokio::test]
async fn test_snapshot_sequence_increases() {
    let mut engine = agent_session().await;
    let first = engine.create_snapshot().unwrap();
    let second = engine.create_snapshot().unwrap();
    assert!(second.locator.sequence > first.locator.sequence);
}

#[tokio::test]
async fn test_undo_and_redo_review_steps() {
    let mut engine = agent_session().await;
    assert!(!engine.can_undo());

    engine.keep_cell(2).unwrap();
    assert_eq!(engine.change_count(), 1);
    assert!(engine.can_undo());

    assert!(engine.undo_step().await);
    assert_eq!(engine.change_count(), 2);
    assert_eq!(engine.original().len(), 3);
    assert!(engine.can_redo());

    assert!(engine.redo_step().await);
    assert_eq!(engine.change_count(), 1);
    assert_eq!(engine.original().len(), 4);
    assert!(!engine.redo_step().await);
}
