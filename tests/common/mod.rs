//! Common test utilities and helpers
//!
//! Shared helpers for integration tests.

#![allow(dead_code)]

use burn::backend::ndarray::{NdArray, NdArrayDevice};
use burn::backend::Autodiff;
use std::io::Write;
use std::path::{Path, PathBuf};

use charnn::{ModelConfig, RnnType, TrainingConfig};

pub type TestBackend = NdArray;
pub type TestTrainBackend = Autodiff<NdArray>;

pub fn test_device() -> NdArrayDevice {
    NdArrayDevice::Cpu
}

/// Small model for fast tests, dropout off so runs are deterministic
pub fn test_model_config(rnn_type: RnnType) -> ModelConfig {
    ModelConfig::new()
        .with_rnn_type(rnn_type)
        .with_layers(2)
        .with_rnn_size(16)
        .with_embed_size(8)
        .with_dropout(0.0)
        .with_param_init(0.1)
}

pub fn test_training_config(seq_length: usize, batch_size: usize) -> TrainingConfig {
    TrainingConfig::new()
        .with_seq_length(seq_length)
        .with_batch_size(batch_size)
        .with_learning_rate(0.1)
        .with_epochs(1)
        .with_log_every(5)
}

/// Writes `text` to `dir/name` and returns the path
pub fn write_text(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create text file");
    file.write_all(text.as_bytes()).expect("Failed to write text file");
    path
}

/// Random lowercase text with a newline roughly every 50 characters.
/// The result is exactly `len` bytes.
pub fn random_text(len: usize) -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            if rng.gen_ratio(1, 50) {
                '\n'
            } else {
                rng.gen_range(b'a'..=b'z') as char
            }
        })
        .collect()
}

/// `count` lines, each exactly `width` characters long (newline excluded)
pub fn fixed_width_lines(count: usize, width: usize) -> String {
    (0..count)
        .map(|i| {
            let c = (b'a' + (i % 26) as u8) as char;
            let mut line: String = std::iter::repeat(c).take(width).collect();
            line.push('\n');
            line
        })
        .collect()
}
