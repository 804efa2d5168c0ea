use std::sync::{Arc, Mutex};
use textdoc_core::{
    CancelToken, Document, EngineConfig, EngineError, LineEnding, ProgressEvent, ProgressKind,
    cancel_pair,
};
use tokio::io::AsyncReadExt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::Registry;

#[derive(Clone, Default)]
struct LogCapture {
    events: Arc<Mutex<Vec<(String, Vec<(String, String)>)>>>,
}

#[derive(Default)]
struct FieldVisitor {
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields.push((field.name().to_string(), format!("{value:?}")));
    }
}

impl<S: Subscriber> Layer<S> for LogCapture {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if !event.metadata().target().starts_with("textdoc.store") {
            return;
        }
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events
            .lock()
            .unwrap()
            .push((event.metadata().target().to_string(), visitor.fields));
    }
}

#[tokio::test]
async fn test_load_strips_carriage_returns() {
    let mut doc = Document::new();
    let bytes: &[u8] = b"first\r\nsecond\r\n\0third";
    let loaded = doc.load(bytes, &CancelToken::never()).await.unwrap();

    assert_eq!(loaded, 18);
    assert_eq!(doc.text().unwrap(), "first\nsecond\nthird");
    assert_eq!(doc.line_count(), 3);
    assert_eq!(doc.get_line_text(1).unwrap(), "second\n");
    assert!(!doc.is_dirty());
    assert!(!doc.undo_manager().can_undo());
}

#[tokio::test]
async fn test_load_in_small_chunks_keeps_multibyte_chars() {
    let config = EngineConfig {
        load_chunk_size: 4,
        ..EngineConfig::default()
    };
    let mut doc = Document::with_config(config);
    let text = "héllo 世界\nçà va";
    doc.load(text.as_bytes(), &CancelToken::never()).await.unwrap();
    assert_eq!(doc.text().unwrap(), text);
    assert_eq!(doc.line_table().line_head_index(1).unwrap(), 9);
}

#[tokio::test]
async fn test_save_round_trip_through_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.txt");

    let mut doc = Document::from_text("alpha\nbeta\n").unwrap();
    doc.replace(0, 0, "> ").unwrap();
    doc.set_line_ending(LineEnding::Crlf);
    assert!(doc.is_dirty());

    let file = tokio::fs::File::create(&path).await.unwrap();
    let lines = doc.save(file, &CancelToken::never()).await.unwrap();
    assert_eq!(lines, 2);
    assert!(!doc.is_dirty());

    let mut raw = String::new();
    tokio::fs::File::open(&path)
        .await
        .unwrap()
        .read_to_string(&mut raw)
        .await
        .unwrap();
    assert_eq!(raw, "> alpha\r\nbeta\r\n");

    let mut reloaded = Document::new();
    let file = tokio::fs::File::open(&path).await.unwrap();
    reloaded.load(file, &CancelToken::never()).await.unwrap();
    assert_eq!(reloaded.text().unwrap(), "> alpha\nbeta\n");
    assert_eq!(reloaded.line_count(), 3);
}

#[tokio::test]
async fn test_progress_events_bracket_load_and_save() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut doc = Document::new();
    let sink = seen.clone();
    doc.subscribe_progress(move |e: &ProgressEvent| sink.lock().unwrap().push(*e));

    doc.load(&b"x"[..], &CancelToken::never()).await.unwrap();
    let mut out = Vec::new();
    doc.save(&mut out, &CancelToken::never()).await.unwrap();
    assert_eq!(out, b"x");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            ProgressEvent::Begin(ProgressKind::Load),
            ProgressEvent::End {
                kind: ProgressKind::Load,
                completed: true
            },
            ProgressEvent::Begin(ProgressKind::Save),
            ProgressEvent::End {
                kind: ProgressKind::Save,
                completed: true
            },
        ]
    );
}

#[tokio::test]
async fn test_cancelled_load_reports_partial_text() {
    let (handle, token) = cancel_pair();
    handle.cancel();

    let config = EngineConfig {
        load_chunk_size: 4,
        ..EngineConfig::default()
    };
    let mut doc = Document::with_config(config);
    let err = doc.load(&b"abcdefgh\nijkl"[..], &token).await.unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
    assert!(err.is_cancelled());

    // The first chunk made it in and the rows describe it.
    assert_eq!(doc.text().unwrap(), "abcd");
    assert_eq!(doc.line_count(), 1);
}

#[tokio::test]
async fn test_load_replaces_previous_text() {
    let mut doc = Document::from_text("old\ntext").unwrap();
    doc.load(&b"new"[..], &CancelToken::never()).await.unwrap();
    assert_eq!(doc.text().unwrap(), "new");
    assert_eq!(doc.line_count(), 1);
}

#[tokio::test]
async fn test_load_logs_chunk_counts() {
    let capture = LogCapture::default();
    let subscriber = Registry::default().with(capture.clone());
    let _guard = tracing::subscriber::set_default(subscriber);

    let config = EngineConfig {
        load_chunk_size: 4,
        ..EngineConfig::default()
    };
    let mut doc = Document::with_config(config);
    doc.load(&b"abcdefghij"[..], &CancelToken::never()).await.unwrap();

    let events = capture.events.lock().unwrap();
    let (_, fields) = events
        .iter()
        .find(|(_, fields)| fields.iter().any(|(k, v)| k == "message" && v == "load_finished"))
        .expect("load_finished event");
    assert!(fields.contains(&("chunks".to_string(), "3".to_string())));
    assert!(fields.contains(&("loaded".to_string(), "10".to_string())));
}
