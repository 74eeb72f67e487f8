//! charnn: byte-level recurrent language model trained with truncated BPTT

pub mod backend;
pub mod commands;
pub mod data;
pub mod error;
pub mod model;
pub mod tokenizer;
pub mod utils;

// Main re-exports
pub use backend::backend_name;
pub use data::BatchedCorpus;
pub use error::{LmError, Result};
pub use model::{
    Checkpoint, CheckpointPaths, ClipMode, ModelConfig, RnnType, StackedRnn, StackedState, Trainer,
    TrainingConfig, TrainingState, WeightImport,
};
pub use tokenizer::{ByteTokenizer, VOCAB_SIZE};
