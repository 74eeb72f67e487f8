//! Commands Module
//!
//! CLI command implementations.

pub mod train;

pub use train::TrainArgs;
