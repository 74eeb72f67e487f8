//! Tokenizer Integration Tests
//!
//! File-level behavior of the fixed-width byte tokenizer.

mod common;

use charnn::{ByteTokenizer, LmError};
use tempfile::tempdir;

#[test]
fn test_length_is_lines_times_seq_length() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = common::write_text(dir.path(), "mixed.txt", "short\na much longer line than ten\n\nend");

    let tok = ByteTokenizer::new(10).unwrap();
    let ids = tok.tokenize_file(&path).unwrap();

    // 4 lines: "short\n", the long one, "\n", "end"
    assert_eq!(ids.len(), 4 * 10);
}

#[test]
fn test_long_line_truncated_to_prefix() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = common::write_text(dir.path(), "long.txt", "abcdefghijklmnop\n");

    let ids = ByteTokenizer::new(5).unwrap().tokenize_file(&path).unwrap();
    assert_eq!(ids, b"abcde".to_vec());
}

#[test]
fn test_short_line_zero_padded() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = common::write_text(dir.path(), "short.txt", "hi\nyo\n");

    let ids = ByteTokenizer::new(6).unwrap().tokenize_file(&path).unwrap();
    assert_eq!(ids, vec![b'h', b'i', b'\n', 0, 0, 0, b'y', b'o', b'\n', 0, 0, 0]);
}

#[test]
fn test_non_ascii_bytes_kept() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = common::write_text(dir.path(), "utf8.txt", "ção\n");

    let ids = ByteTokenizer::new(8).unwrap().tokenize_file(&path).unwrap();
    // "ç" and "ã" are two bytes each in UTF-8
    assert_eq!(&ids[..6], "ção\n".as_bytes());
    assert_eq!(&ids[6..], &[0, 0]);
}

#[test]
fn test_missing_file_is_error() {
    let dir = tempdir().expect("Failed to create temp dir");
    let err = ByteTokenizer::new(8)
        .unwrap()
        .tokenize_file(&dir.path().join("absent.txt"))
        .unwrap_err();
    assert!(matches!(err, LmError::FileNotFound(_)));
}
