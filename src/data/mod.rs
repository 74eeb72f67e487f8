// src/data/mod.rs

mod batcher;

pub use batcher::BatchedCorpus;
