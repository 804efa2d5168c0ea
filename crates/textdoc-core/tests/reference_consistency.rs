//! Random edit consistency.
//!
//! Validation criteria:
//! 1. Text and row heads match a `ropey::Rope` driven with the same edits.
//! 2. Every index maps to a point and back.
//! 3. Undoing every edit restores the original text; redoing restores the final text.

use proptest::prelude::*;
use rand::Rng;
use ropey::Rope;
use textdoc_core::{Document, EngineConfig};

fn assert_rows_match(doc: &Document, reference: &Rope) {
    assert_eq!(doc.len(), reference.len_chars());
    assert_eq!(doc.line_count(), reference.len_lines());
    for row in 0..doc.line_count() {
        assert_eq!(
            doc.line_table().line_head_index(row).unwrap(),
            reference.line_to_char(row),
            "head of row {row}"
        );
    }
}

#[test]
fn test_random_edits_match_rope() {
    let mut rng = rand::thread_rng();
    let seed_text = "fn main() {\n    println!(\"hi\");\n}\n".repeat(20);
    let mut doc = Document::from_text(&seed_text).unwrap();
    let mut reference = Rope::from_str(&seed_text);
    let pieces = ["x", "\n", "ab\ncd", "", "世界", "\n\n", "tail"];

    for step in 0..400 {
        let len = reference.len_chars();
        let index = rng.gen_range(0..=len);
        let remove = rng.gen_range(0..=(len - index).min(8));
        let insert = pieces[rng.gen_range(0..pieces.len())];

        doc.replace(index, remove, insert).unwrap();
        reference.remove(index..index + remove);
        reference.insert(index, insert);

        if step % 20 == 0 {
            assert_rows_match(&doc, &reference);
        }
    }
    assert_rows_match(&doc, &reference);
    assert_eq!(doc.text().unwrap(), reference.to_string());
}

#[test]
fn test_long_lines_are_split_at_the_row_limit() {
    let config = EngineConfig {
        max_line_length: 8,
        ..EngineConfig::default()
    };
    let mut doc = Document::with_config(config);
    doc.replace(0, 0, &"a".repeat(20)).unwrap();
    assert_eq!(doc.line_count(), 3);
    assert_eq!(doc.line_table().line_length(1).unwrap(), 8);
    assert!(!doc.line_table().line_end(0).unwrap());
    assert!(doc.line_table().line_end(2).unwrap());

    // Rejoining keeps rows within the limit.
    doc.replace(4, 0, "\n").unwrap();
    let lengths: Vec<usize> = (0..doc.line_count())
        .map(|r| doc.line_table().line_length(r).unwrap())
        .collect();
    assert_eq!(lengths, vec![5, 8, 8]);
}

fn edit() -> impl Strategy<Value = (usize, usize, String)> {
    (0usize..64, 0usize..6, "[a-c\n]{0,5}")
}

proptest! {
    #[test]
    fn prop_points_round_trip(text in "[a-z\n]{0,60}") {
        let doc = Document::from_text(&text).unwrap();
        for index in 0..=doc.len() {
            let point = doc.text_point_from_index(index).unwrap();
            prop_assert_eq!(doc.index_from_text_point(point).unwrap(), index);
        }
    }

    #[test]
    fn prop_undo_all_restores_text(start in "[a-z\n]{0,40}", edits in prop::collection::vec(edit(), 1..12)) {
        let mut doc = Document::from_text(&start).unwrap();
        for (index, remove, insert) in &edits {
            let index = index % (doc.len() + 1);
            let remove = (*remove).min(doc.len() - index);
            doc.replace(index, remove, insert).unwrap();
        }
        let end = doc.text().unwrap();

        while doc.undo().unwrap() {}
        prop_assert_eq!(doc.text().unwrap(), start.clone());
        let reference = Rope::from_str(&start);
        prop_assert_eq!(doc.line_count(), reference.len_lines());

        while doc.redo().unwrap() {}
        prop_assert_eq!(doc.text().unwrap(), end);
    }
}
