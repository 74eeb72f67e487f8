mod cell;
mod checkpoint;
mod config;
mod evaluator;
mod grad;
mod import;
mod loss;
mod mlstm;
mod stacked;
mod state;
mod trainer;

pub use cell::{GruCell, LstmCell, RecurrentCell};
pub use checkpoint::{Checkpoint, CheckpointPaths, CheckpointRecord, LoadedCheckpoint};
pub use config::{ClipMode, ModelConfig, RnnType, TrainingConfig, TrainingState};
pub use evaluator::{EvalMetrics, Evaluator};
pub use grad::{clip_coefficient, clip_gradients, grad_norm, max_abs_grad};
pub use import::{WeightArray, WeightImport};
pub use loss::cross_entropy;
pub use mlstm::{MLstmCell, MLstmWeights};
pub use stacked::{StackedRnn, StackedRnnConfig};
pub use state::{LayerState, StackedState};
pub use trainer::{EpochReport, EpochSummary, StopSignal, Trainer};
