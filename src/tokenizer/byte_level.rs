// src/tokenizer/byte_level.rs
//! Fixed-width byte tokenizer: one slot of `seq_length` bytes per input line.

use std::path::Path;

use crate::error::{LmError, Result};

/// Number of distinct byte tokens.
pub const VOCAB_SIZE: usize = 256;

/// Counts gathered by the first pass over a file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenizeStats {
    pub lines: usize,
    pub bytes: usize,
}

/// Byte-level tokenizer with a fixed stride per line
#[derive(Debug, Clone)]
pub struct ByteTokenizer {
    seq_length: usize,
}

impl ByteTokenizer {
    pub fn new(seq_length: usize) -> Result<Self> {
        if seq_length == 0 {
            return Err(LmError::Config("seq_length must be > 0".into()));
        }
        Ok(Self { seq_length })
    }

    pub fn seq_length(&self) -> usize {
        self.seq_length
    }

    /// Reads `path` and tokenizes it. A missing file is fatal.
    pub fn tokenize_file(&self, path: &Path) -> Result<Vec<u8>> {
        if !path.exists() {
            return Err(LmError::FileNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read(path).map_err(|source| LmError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let stats = Self::count(&raw);
        tracing::info!(
            "{}: {} bytes, {} lines",
            path.display(),
            stats.bytes,
            stats.lines
        );

        Ok(self.tokenize_bytes(&raw))
    }

    /// First pass: line and byte counts.
    pub fn count(raw: &[u8]) -> TokenizeStats {
        TokenizeStats {
            lines: raw.split_inclusive(|&b| b == b'\n').count(),
            bytes: raw.len(),
        }
    }

    /// Second pass: every line gets exactly `seq_length` slots. Longer lines
    /// are truncated, shorter ones leave trailing zeros.
    pub fn tokenize_bytes(&self, raw: &[u8]) -> Vec<u8> {
        let stats = Self::count(raw);
        let mut ids = vec![0u8; stats.lines * self.seq_length];

        let mut cursor = 0;
        for line in raw.split_inclusive(|&b| b == b'\n') {
            let take = line.len().min(self.seq_length);
            ids[cursor..cursor + take].copy_from_slice(&line[..take]);
            cursor += self.seq_length;
        }

        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_line_gets_full_slot() {
        let tok = ByteTokenizer::new(4).unwrap();
        let ids = tok.tokenize_bytes(b"ab\ncdefgh\n");

        assert_eq!(ids.len(), 2 * 4);
        assert_eq!(&ids[..4], &[b'a', b'b', b'\n', 0]);
        assert_eq!(&ids[4..], b"cdef");
    }

    #[test]
    fn test_last_line_without_newline() {
        let tok = ByteTokenizer::new(3).unwrap();
        let ids = tok.tokenize_bytes(b"x\nyz");

        assert_eq!(ids, vec![b'x', b'\n', 0, b'y', b'z', 0]);
    }

    #[test]
    fn test_empty_input() {
        let tok = ByteTokenizer::new(8).unwrap();
        assert!(tok.tokenize_bytes(b"").is_empty());
        assert_eq!(ByteTokenizer::count(b""), TokenizeStats::default());
    }

    #[test]
    fn test_zero_seq_length_rejected() {
        assert!(matches!(ByteTokenizer::new(0), Err(LmError::Config(_))));
    }

    #[test]
    fn test_missing_file() {
        let tok = ByteTokenizer::new(8).unwrap();
        let err = tok.tokenize_file(Path::new("/definitely/not/here.txt")).unwrap_err();
        assert!(matches!(err, LmError::FileNotFound(_)));
    }
}
