use super::*;
use crate::database::{Metadata, MetadataValue};

fn config(max_size: usize, overlap: usize) -> ChunkingConfig {
    ChunkingConfig { max_size, overlap }
}

fn reconstruct(windows: &[TextWindow], overlap: usize) -> String {
    let mut out = String::new();
    for (i, w) in windows.iter().enumerate() {
        if i == 0 {
            out.push_str(&w.text);
        } else {
            out.extend(w.text.chars().skip(overlap));
        }
    }
    out
}

fn prose(chars: usize) -> String {
    let sentence = "The quick brown fox jumps over the lazy dog. ";
    sentence.chars().cycle().take(chars).collect()
}

#[test]
fn rejects_invalid_config() {
    assert!(matches!(
        split_text("abc", &config(0, 0)),
        Err(RagError::InvalidChunkConfig(_))
    ));
    assert!(matches!(
        split_text("abc", &config(10, 10)),
        Err(RagError::InvalidChunkConfig(_))
    ));
    assert!(matches!(
        split_text("abc", &config(10, 20)),
        Err(RagError::InvalidChunkConfig(_))
    ));
}

#[test]
fn empty_text_has_no_chunks() {
    let windows = split_text("", &ChunkingConfig::default()).expect("valid config");
    assert!(windows.is_empty());
}

#[test]
fn short_text_is_single_chunk() {
    let windows = split_text("hello world", &config(100, 10)).expect("valid config");
    assert_eq!(windows.len(), 1);
    assert_eq!(windows[0].text, "hello world");
    assert_eq!(windows[0].start, 0);
}

#[test]
fn text_of_exactly_max_size_is_single_chunk() {
    let text = "a".repeat(100);
    let windows = split_text(&text, &config(100, 10)).expect("valid config");
    assert_eq!(windows.len(), 1);
}

#[test]
fn twenty_five_hundred_chars_make_three_chunks() {
    let text = prose(2500);
    let windows = split_text(&text, &config(1000, 100)).expect("valid config");

    assert_eq!(windows.len(), 3);
    for w in &windows {
        assert!(w.text.chars().count() <= 1000);
    }
    assert_eq!(reconstruct(&windows, 100), text);
}

#[test]
fn consecutive_windows_share_overlap() {
    let text = prose(5000);
    let overlap = 150;
    let windows = split_text(&text, &config(700, overlap)).expect("valid config");

    assert!(windows.len() > 1);
    for pair in windows.windows(2) {
        let prev_tail: String = {
            let chars: Vec<char> = pair[0].text.chars().collect();
            chars[chars.len() - overlap..].iter().collect()
        };
        let next_head: String = pair[1].text.chars().take(overlap).collect();
        assert_eq!(prev_tail, next_head);
        assert_eq!(
            pair[1].start,
            pair[0].start + pair[0].text.chars().count() - overlap
        );
    }
    assert_eq!(reconstruct(&windows, overlap), text);
}

#[test]
fn unbroken_text_is_cut_at_max_size() {
    let text = "x".repeat(250);
    let windows = split_text(&text, &config(100, 0)).expect("valid config");

    let lengths: Vec<usize> = windows.iter().map(|w| w.text.chars().count()).collect();
    assert_eq!(lengths, vec![100, 100, 50]);
}

#[test]
fn prefers_paragraph_break() {
    let mut text = "a".repeat(93);
    text.push_str("\n\n");
    text.push_str(&"b".repeat(2));
    text.push_str(". ");
    text.push_str(&"c".repeat(100));

    let windows = split_text(&text, &config(100, 0)).expect("valid config");

    assert!(windows[0].text.ends_with("\n\n"));
    assert_eq!(windows[0].text.chars().count(), 95);
}

#[test]
fn prefers_sentence_end_over_plain_space() {
    let mut text = "a".repeat(90);
    text.push_str(". bb ");
    text.push_str(&"c".repeat(100));

    let windows = split_text(&text, &config(100, 0)).expect("valid config");

    assert!(windows[0].text.ends_with(". "));
}

#[test]
fn handles_multibyte_characters() {
    let text = "héllo wörld ünïcode ".repeat(40);
    let windows = split_text(&text, &config(64, 8)).expect("valid config");

    for w in &windows {
        assert!(w.text.chars().count() <= 64);
    }
    assert_eq!(reconstruct(&windows, 8), text);
}

#[test]
fn chunk_document_sets_ids_and_offsets() {
    let mut metadata = Metadata::new();
    metadata.insert("filename".to_string(), "notes.txt".into());
    let document = Document::with_id("doc", prose(2500), metadata);

    let chunks = chunk_document(&document, &config(1000, 100)).expect("valid config");

    assert_eq!(chunks.len(), 3);
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.id, format!("doc:{i}"));
        assert_eq!(chunk.document_id, "doc");
        assert_eq!(chunk.metadata.get("filename"), Some(&"notes.txt".into()));
    }
    assert_eq!(
        chunks[0].metadata.get("start_offset"),
        Some(&MetadataValue::Integer(0))
    );
    assert!(matches!(
        chunks[1].metadata.get("start_offset"),
        Some(MetadataValue::Integer(offset)) if *offset > 800 && *offset <= 900
    ));
}

#[test]
fn chunk_stats() {
    let document = Document::with_id("doc", "x".repeat(250), Metadata::new());
    let chunks = chunk_document(&document, &config(100, 0)).expect("valid config");

    let stats = ChunkStats::from_chunks(&chunks);
    assert_eq!(stats.count, 3);
    assert_eq!(stats.min_len, 50);
    assert_eq!(stats.max_len, 100);
    assert_eq!(stats.total_chars, 250);
    assert_eq!(stats.avg_len, 83);

    assert_eq!(ChunkStats::from_chunks(&[]), ChunkStats::default());
}
