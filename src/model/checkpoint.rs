// src/model/checkpoint.rs
//! Checkpoint bundle: embedding + stacked network + configuration (+ epoch).
//!
//! The whole bundle is one record serialized to bytes and written to the
//! exact path given, so the rolling `temp` file and the per-epoch
//! `{name}_e{epoch}_{loss}.pt` files keep their names.

use std::path::{Path, PathBuf};

use burn::{
    module::Module,
    nn::Embedding,
    record::{FullPrecisionSettings, NamedMpkBytesRecorder, Record, Recorder},
    tensor::backend::Backend,
};
use serde::{Deserialize, Serialize};

use crate::error::{LmError, Result};

use super::config::{ModelConfig, TrainingConfig};
use super::stacked::StackedRnn;

type CheckpointRecorder = NamedMpkBytesRecorder<FullPrecisionSettings>;

#[derive(Record)]
pub struct CheckpointRecord<B: Backend> {
    pub embed: <Embedding<B> as Module<B>>::Record,
    pub rnn: <StackedRnn<B> as Module<B>>::Record,
    /// JSON-encoded `CheckpointMeta`
    pub meta: String,
}

#[derive(Serialize, Deserialize)]
struct CheckpointMeta {
    model: ModelConfig,
    training: TrainingConfig,
    epoch: Option<usize>,
}

/// Everything restored from a checkpoint
#[derive(Debug)]
pub struct LoadedCheckpoint<B: Backend> {
    pub embed: Embedding<B>,
    pub rnn: StackedRnn<B>,
    pub model: ModelConfig,
    pub training: TrainingConfig,
    pub epoch: Option<usize>,
}

/// Where the epoch driver writes its checkpoints
#[derive(Debug, Clone)]
pub struct CheckpointPaths {
    /// Prefix of per-epoch files, may include directories
    pub save_model: String,
    /// Rolling mid-epoch checkpoint; `None` disables it
    pub temp: Option<PathBuf>,
}

impl CheckpointPaths {
    pub fn new(save_model: impl Into<String>) -> Self {
        Self {
            save_model: save_model.into(),
            temp: Some(PathBuf::from("temp")),
        }
    }

    pub fn with_temp(mut self, temp: Option<PathBuf>) -> Self {
        self.temp = temp;
        self
    }

    /// `{save_model}_e{epoch}_{valid_loss:.2}.pt`
    pub fn epoch_file(&self, epoch: usize, valid_loss: f32) -> PathBuf {
        PathBuf::from(format!("{}_e{}_{:.2}.pt", self.save_model, epoch, valid_loss))
    }
}

pub struct Checkpoint;

impl Checkpoint {
    pub fn save<B: Backend>(
        path: &Path,
        embed: &Embedding<B>,
        rnn: &StackedRnn<B>,
        model: &ModelConfig,
        training: &TrainingConfig,
        epoch: Option<usize>,
    ) -> Result<()> {
        let meta = CheckpointMeta {
            model: model.clone(),
            training: training.clone(),
            epoch,
        };
        let meta = serde_json::to_string(&meta).map_err(|e| LmError::Checkpoint(e.to_string()))?;

        let record = CheckpointRecord::<B> {
            embed: embed.clone().into_record(),
            rnn: rnn.clone().into_record(),
            meta,
        };
        let bytes = Recorder::<B>::record(&CheckpointRecorder::default(), record, ())
            .map_err(|e| LmError::Checkpoint(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| LmError::FileWrite {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, bytes).map_err(|source| LmError::FileWrite {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Checkpoint written: {}", path.display());
        Ok(())
    }

    /// Restores the full bundle. Nothing is returned unless every part
    /// loaded and the embedding fits the network.
    pub fn load<B: Backend>(path: &Path, device: &B::Device) -> Result<LoadedCheckpoint<B>> {
        if !path.exists() {
            return Err(LmError::FileNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|source| LmError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let record: CheckpointRecord<B> = Recorder::<B>::load(&CheckpointRecorder::default(), bytes, device)
            .map_err(|e| LmError::Checkpoint(format!("{}: {}", path.display(), e)))?;
        let meta: CheckpointMeta =
            serde_json::from_str(&record.meta).map_err(|e| LmError::Checkpoint(e.to_string()))?;
        meta.model.validate()?;

        let embed = meta.model.init_embedding::<B>(device).load_record(record.embed);
        let rnn = meta.model.stacked().init::<B>(device)?.load_record(record.rnn);
        rnn.check_embedding(&embed)?;

        tracing::info!(
            "Loaded checkpoint {} ({} x{} {}, epoch {:?})",
            path.display(),
            meta.model.rnn_type,
            meta.model.layers,
            meta.model.rnn_size,
            meta.epoch
        );

        Ok(LoadedCheckpoint {
            embed,
            rnn,
            model: meta.model,
            training: meta.training,
            epoch: meta.epoch,
        })
    }
}
