use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use textdoc_core::{
    Document, DocumentUpdate, EngineError, HilightType, Marker, MarkerIds, StatusKind, TextPoint,
    UpdateKind,
};

#[test]
fn test_hello_world_rows() {
    let mut doc = Document::new();
    doc.replace(0, 0, "hello\nworld").unwrap();

    assert_eq!(doc.line_count(), 2);
    assert_eq!(doc.line_table().line_head_index(1).unwrap(), 6);
    assert_eq!(doc.get_line_text(0).unwrap(), "hello\n");
    assert_eq!(doc.get_line_text(1).unwrap(), "world");
    assert_eq!(doc.text_point_from_index(8).unwrap(), TextPoint::new(1, 2));
    assert_eq!(doc.index_from_text_point(TextPoint::new(1, 5)).unwrap(), 11);
}

#[test]
fn test_trailing_line_break_adds_empty_row() {
    let mut doc = Document::from_text("a\nb\n").unwrap();
    assert_eq!(doc.line_count(), 3);
    assert_eq!(doc.line_table().line_length(2).unwrap(), 0);
    assert_eq!(doc.line_table().line_head_index(2).unwrap(), 4);

    doc.replace(3, 1, "").unwrap();
    assert_eq!(doc.line_count(), 2);
    assert_eq!(doc.text().unwrap(), "a\nb");
}

#[test]
fn test_join_and_split_lines() {
    let mut doc = Document::from_text("one\ntwo\nthree").unwrap();
    doc.replace(3, 1, " ").unwrap();
    assert_eq!(doc.line_count(), 2);
    assert_eq!(doc.get_line_text(0).unwrap(), "one two\n");

    doc.replace(3, 1, "\n\n").unwrap();
    assert_eq!(doc.line_count(), 4);
    assert_eq!(doc.get_line_text(1).unwrap(), "\n");
    assert_eq!(doc.get_line_text(2).unwrap(), "two\n");
    assert_eq!(doc.line_table().line_head_index(3).unwrap(), 9);
}

#[test]
fn test_typing_in_a_group_is_one_undo_step() {
    let mut doc = Document::new();
    doc.undo_manager_mut().begin_undo_group();
    for (i, ch) in ["a", "b", "c"].into_iter().enumerate() {
        doc.replace(i, 0, ch).unwrap();
        doc.set_caret_position(TextPoint::new(0, i + 1)).unwrap();
    }
    doc.undo_manager_mut().end_undo_group().unwrap();
    assert_eq!(doc.text().unwrap(), "abc");

    assert!(doc.undo().unwrap());
    assert_eq!(doc.text().unwrap(), "");
    assert_eq!(doc.caret_position(), TextPoint::new(0, 0));
    assert!(!doc.undo().unwrap());

    assert!(doc.redo().unwrap());
    assert_eq!(doc.text().unwrap(), "abc");
    assert!(!doc.undo_manager().can_redo());
}

#[test]
fn test_undo_restores_rows() {
    let mut doc = Document::from_text("alpha\nbeta").unwrap();
    doc.replace(2, 6, "X\nY\nZ").unwrap();
    assert_eq!(doc.text().unwrap(), "alX\nY\nZta");
    assert_eq!(doc.line_count(), 3);

    doc.undo().unwrap();
    assert_eq!(doc.text().unwrap(), "alpha\nbeta");
    assert_eq!(doc.line_count(), 2);
    assert_eq!(doc.get_line_text(1).unwrap(), "beta");

    doc.redo().unwrap();
    assert_eq!(doc.get_line_text(2).unwrap(), "Zta");
}

#[test]
fn test_out_of_range_edit_leaves_document_untouched() {
    let mut doc = Document::from_text("abc").unwrap();
    let err = doc.replace(1, 3, "").unwrap_err();
    assert!(matches!(err, EngineError::OutOfRange { index: 1, length: 3, len: 3 }));
    assert_eq!(doc.text().unwrap(), "abc");
    assert!(!doc.is_dirty());
}

#[test]
fn test_update_and_status_events() {
    let updates = Arc::new(Mutex::new(Vec::new()));
    let statuses = Arc::new(Mutex::new(Vec::new()));
    let mut doc = Document::new();
    let u = updates.clone();
    doc.subscribe_update(move |e: &DocumentUpdate| u.lock().unwrap().push(*e));
    let s = statuses.clone();
    let id = doc.subscribe_status(move |k: &StatusKind| s.lock().unwrap().push(*k));

    doc.replace(0, 0, "xy").unwrap();
    doc.set_insert_mode(false);
    doc.clear().unwrap();
    assert!(doc.unsubscribe_status(id));
    doc.set_insert_mode(true);

    let updates = updates.lock().unwrap();
    assert_eq!(updates.len(), 2);
    assert_eq!(updates[0], DocumentUpdate::replace(0, 0, 2));
    assert_eq!(updates[1].kind, UpdateKind::Clear);
    assert_eq!(updates[1].removed_length, 2);

    let statuses = statuses.lock().unwrap();
    assert_eq!(
        *statuses,
        vec![StatusKind::Dirty, StatusKind::InsertMode, StatusKind::Dirty]
    );
}

#[test]
fn test_markers_follow_edits() {
    let mut doc = Document::from_text("let value = 1;").unwrap();
    doc.set_marker(MarkerIds::DEFAULT, Marker::new(4, 5, HilightType::Squiggle))
        .unwrap();
    doc.set_marker(MarkerIds::URL, Marker::new(12, 1, HilightType::Url))
        .unwrap();

    doc.replace(0, 0, "    ").unwrap();
    assert_eq!(doc.get_markers(MarkerIds::DEFAULT, 10).unwrap()[0].start, 8);

    // An edit touching a marker drops it, for every id.
    doc.replace(16, 1, "2").unwrap();
    assert!(doc.markers().get(MarkerIds::URL).next().is_none());
    assert_eq!(doc.markers().get(MarkerIds::DEFAULT).count(), 1);

    doc.remove_all_markers(MarkerIds::DEFAULT);
    assert!(doc.markers().get(MarkerIds::DEFAULT).next().is_none());
}

#[test]
fn test_rect_selection_and_replace() {
    let mut doc = Document::from_text("0123\nab\n4567").unwrap();
    doc.set_rect_selection(true);
    doc.select_rect(TextPoint::new(0, 1), 2, 2).unwrap();

    let ranges: Vec<(usize, usize)> = doc.selections().iter().map(|s| (s.start, s.length)).collect();
    assert_eq!(ranges, vec![(1, 2), (6, 1), (9, 2)]);
    assert_eq!(doc.selected_text().unwrap(), "12\nb\n56");

    doc.replace_selection("-").unwrap();
    assert_eq!(doc.text().unwrap(), "0-3\na-\n4-7");

    doc.undo().unwrap();
    assert_eq!(doc.text().unwrap(), "0123\nab\n4567");
}

#[test]
fn test_rect_select_needs_rect_mode() {
    let mut doc = Document::from_text("abc").unwrap();
    assert!(matches!(
        doc.select_rect(TextPoint::new(0, 0), 1, 0),
        Err(EngineError::InvalidOperation(_))
    ));
}

#[test]
fn test_stream_replace_at_anchor() {
    let mut doc = Document::from_text("ac").unwrap();
    doc.set_anchor_index(1).unwrap();
    doc.replace_selection("b").unwrap();
    assert_eq!(doc.text().unwrap(), "abc");
    assert_eq!(doc.caret_position(), TextPoint::new(0, 2));
}

#[test]
fn test_selection_straddling_a_deletion_keeps_its_start() {
    let mut doc = Document::from_text("abcdefghij").unwrap();
    doc.select(2, 4).unwrap();
    assert_eq!(doc.selected_text().unwrap(), "cdef");

    doc.replace(4, 2, "").unwrap();
    assert_eq!(doc.text().unwrap(), "abcdghij");
    assert_eq!(doc.selected_text().unwrap(), "cd");
}

#[test]
fn test_selection_straddling_an_insertion_grows() {
    let mut doc = Document::from_text("abcdefghij").unwrap();
    doc.select(2, 4).unwrap();

    doc.replace(4, 0, "XYZ").unwrap();
    assert_eq!(doc.selected_text().unwrap(), "cdXYZef");

    // Edits after the selection leave it alone; edits before shift it.
    doc.replace(12, 1, "").unwrap();
    assert_eq!(doc.selected_text().unwrap(), "cdXYZef");
    doc.replace(0, 1, "").unwrap();
    assert_eq!(doc.selected_text().unwrap(), "cdXYZef");
    assert_eq!(doc.selections().first().map(|s| s.start), Some(1));
}
