use pretty_assertions::assert_eq;
use textdoc_core::{Color, Document, EngineError, HilightType, MarkerPattern, SearchOptions};

fn case_insensitive() -> SearchOptions {
    SearchOptions {
        case_sensitive: false,
        ..SearchOptions::default()
    }
}

#[test]
fn test_replace_all_case_insensitive_is_one_undo_step() {
    let mut doc = Document::from_text("Foo foo FOO").unwrap();
    doc.set_find_param("foo", false, case_insensitive()).unwrap();

    assert_eq!(doc.replace_all("bar", false).unwrap(), 1);
    assert_eq!(doc.text().unwrap(), "bar bar bar");
    assert_eq!(doc.undo_manager().undo_depth(), 1);

    doc.undo().unwrap();
    assert_eq!(doc.text().unwrap(), "Foo foo FOO");
    doc.redo().unwrap();
    assert_eq!(doc.text().unwrap(), "bar bar bar");
}

#[test]
fn test_replace_all_without_hits_records_nothing() {
    let mut doc = Document::from_text("nothing here").unwrap();
    doc.set_find_param("zzz", false, SearchOptions::default())
        .unwrap();
    assert_eq!(doc.replace_all("y", false).unwrap(), 0);
    assert!(!doc.undo_manager().can_undo());
    assert!(!doc.is_dirty());
}

#[test]
fn test_replace_all_does_not_rescan_replacements() {
    let mut doc = Document::from_text("a\na a\n").unwrap();
    doc.set_find_param("a", false, SearchOptions::default())
        .unwrap();
    doc.replace_all("aa", false).unwrap();
    assert_eq!(doc.text().unwrap(), "aa\naa aa\n");
    assert_eq!(doc.line_count(), 3);
    assert_eq!(doc.line_table().line_head_index(1).unwrap(), 3);
}

#[test]
fn test_group_replace_over_rows() {
    let mut doc = Document::from_text("x=1\ny=22\nz").unwrap();
    doc.set_find_param(r"(\w)=(\d+)", true, SearchOptions::default())
        .unwrap();
    assert_eq!(doc.replace_all("$2:$1", true).unwrap(), 2);
    assert_eq!(doc.text().unwrap(), "1:x\n22:y\nz");
    assert_eq!(doc.get_line_text(1).unwrap(), "22:y\n");
}

#[test]
fn test_replace_all_literal() {
    let mut doc = Document::from_text("Tab\ttab\nTAB").unwrap();
    assert_eq!(doc.replace_all_literal("tab", "sp", true).unwrap(), 2);
    assert_eq!(doc.text().unwrap(), "sp\tsp\nsp");

    doc.undo().unwrap();
    assert_eq!(doc.text().unwrap(), "Tab\ttab\nTAB");
    assert!(doc.replace_all_literal("", "x", false).is_err());
}

#[test]
fn test_replace_all_literal_case_insensitive_is_one_undo_step() {
    let mut doc = Document::from_text("Foo foo FOO").unwrap();
    assert_eq!(doc.replace_all_literal("foo", "bar", true).unwrap(), 1);
    assert_eq!(doc.text().unwrap(), "bar bar bar");
    assert_eq!(doc.undo_manager().undo_depth(), 1);

    assert!(doc.undo().unwrap());
    assert_eq!(doc.text().unwrap(), "Foo foo FOO");
    assert!(!doc.undo_manager().can_undo());
    assert!(doc.redo().unwrap());
    assert_eq!(doc.text().unwrap(), "bar bar bar");
}

#[test]
fn test_find_all_and_expand() {
    let mut doc = Document::from_text("id: 7\nid: 42").unwrap();
    doc.set_find_param(r"id: (\d+)", true, SearchOptions::default())
        .unwrap();
    let hits = doc.find_all().unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!((hits[1].start, hits[1].end), (6, 12));
    assert_eq!(doc.expand_replacement(&hits[1], "#$1").unwrap(), "#42");
}

#[test]
fn test_find_inside_range_only() {
    let mut doc = Document::from_text("ab ab ab").unwrap();
    doc.set_find_param("ab", false, SearchOptions::default())
        .unwrap();
    let mut cursor = doc.find(2, 4).unwrap();
    let hit = doc.find_next(&mut cursor).unwrap().unwrap();
    assert_eq!(hit.start, 3);
    assert!(doc.find_next(&mut cursor).unwrap().is_none());
    assert!(matches!(doc.find(5, 10), Err(EngineError::OutOfRange { .. })));
}

#[test]
fn test_find_marker_pattern() {
    let mut doc = Document::from_text("one two one").unwrap();
    doc.set_find_param("one", false, SearchOptions::default())
        .unwrap();
    let pattern = doc
        .find_marker_pattern(HilightType::Select, Color::new(255, 255, 255, 0))
        .unwrap();
    let found = pattern.markers(100, "one two one");
    let starts: Vec<usize> = found.iter().map(|m| m.start).collect();
    assert_eq!(starts, vec![100, 108]);
}

#[test]
fn test_index_of_uses_quick_search() {
    let doc = Document::from_text("needle in a haystack with NEEDLE").unwrap();
    assert_eq!(doc.index_of("needle", 1, false).unwrap(), None);
    assert_eq!(doc.index_of("needle", 1, true).unwrap(), Some(26));
}
