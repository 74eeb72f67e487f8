use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LmError {
    // --- I/O ---
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    // --- Config ---
    #[error("Invalid config: {0}")]
    Config(String),

    // --- Model ---
    #[error("Shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("Layer {layer} expects a {expected} state, got {got}")]
    StateMismatch {
        layer: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("Weight import failed for `{name}`: {reason}")]
    WeightImport { name: String, reason: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    // --- Training ---
    #[error("Loss diverged (NaN/Inf) at epoch {epoch}, batch {batch}")]
    Diverged { epoch: usize, batch: usize },

    // --- Device ---
    #[error("No accelerator backend compiled in (build with --features cuda or --features gpu)")]
    CudaUnavailable,
}

pub type Result<T> = std::result::Result<T, LmError>;
