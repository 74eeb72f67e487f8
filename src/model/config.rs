// src/model/config.rs
//! Model and training configuration. Both are embedded in every checkpoint.

use burn::config::Config;
use burn::nn::{Embedding, EmbeddingConfig, Initializer};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::error::{LmError, Result as LmResult};
use crate::tokenizer::VOCAB_SIZE;

use super::stacked::StackedRnnConfig;

/// Recurrent cell used by every layer of the stack
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RnnType {
    Gru,
    Lstm,
    #[value(name = "mlstm")]
    MLstm,
}

impl std::fmt::Display for RnnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RnnType::Gru => "gru",
            RnnType::Lstm => "lstm",
            RnnType::MLstm => "mlstm",
        };
        f.write_str(name)
    }
}

/// How gradients are bounded before the optimizer step
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClipMode {
    /// Clamp every component to `[-clip, clip]`
    Value,
    /// Rescale all gradients by `min(1, clip / (norm + 1e-6))`
    Norm,
}

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = "RnnType::Gru")]
    pub rnn_type: RnnType,

    #[config(default = "1")]
    pub layers: usize,

    #[config(default = "1024")]
    pub rnn_size: usize,

    #[config(default = "128")]
    pub embed_size: usize,

    #[config(default = "0.1")]
    pub dropout: f64,

    /// Support of the uniform initializer for the layers built here
    #[config(default = "0.05")]
    pub param_init: f64,
}

impl ModelConfig {
    pub fn validate(&self) -> LmResult<()> {
        if self.layers == 0 {
            return Err(LmError::Config("layers must be >= 1".into()));
        }
        if self.rnn_size == 0 || self.embed_size == 0 {
            return Err(LmError::Config(format!(
                "rnn_size and embed_size must be > 0 (got {} / {})",
                self.rnn_size, self.embed_size
            )));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(LmError::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.param_init <= 0.0 {
            return Err(LmError::Config(format!(
                "param_init must be > 0, got {}",
                self.param_init
            )));
        }
        Ok(())
    }

    pub fn initializer(&self) -> Initializer {
        Initializer::Uniform {
            min: -self.param_init,
            max: self.param_init,
        }
    }

    pub fn stacked(&self) -> StackedRnnConfig {
        StackedRnnConfig::new(self.rnn_type, self.layers, self.embed_size, self.rnn_size)
            .with_output_size(VOCAB_SIZE)
            .with_dropout(self.dropout)
            .with_param_init(self.param_init)
    }

    pub fn init_embedding<B: Backend>(&self, device: &B::Device) -> Embedding<B> {
        EmbeddingConfig::new(VOCAB_SIZE, self.embed_size)
            .with_initializer(self.initializer())
            .init(device)
    }

    /// Parameter count for embedding + stack + projection
    pub fn num_parameters(&self) -> usize {
        let (e, h, v) = (self.embed_size, self.rnn_size, VOCAB_SIZE);
        let per_layer = |d_in: usize| match self.rnn_type {
            RnnType::Gru => 3 * (d_in * h + h) + 3 * (h * h + h),
            RnnType::Lstm => 4 * (d_in * h + h) + 4 * (h * h + h),
            RnnType::MLstm => d_in * 4 * h + h * 4 * h + 4 * h + d_in * h + h * h,
        };
        let stack: usize = (0..self.layers)
            .map(|i| per_layer(if i == 0 { e } else { h }))
            .sum();
        v * e + stack + h * v + v
    }
}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = "20")]
    pub seq_length: usize,

    #[config(default = "64")]
    pub batch_size: usize,

    #[config(default = "1e-3")]
    pub learning_rate: f64,

    /// Multiplier applied to the learning rate after every epoch
    #[config(default = "0.7")]
    pub lr_decay: f64,

    #[config(default = "5.0")]
    pub clip: f64,

    #[config(default = "ClipMode::Value")]
    pub clip_mode: ClipMode,

    #[config(default = "10")]
    pub epochs: usize,

    #[config(default = "10")]
    pub log_every: usize,

    #[config(default = "1234")]
    pub seed: u64,
}

impl TrainingConfig {
    pub fn validate(&self) -> LmResult<()> {
        if self.seq_length == 0 || self.batch_size == 0 {
            return Err(LmError::Config(format!(
                "seq_length and batch_size must be > 0 (got {} / {})",
                self.seq_length, self.batch_size
            )));
        }
        if self.learning_rate <= 0.0 || self.clip <= 0.0 {
            return Err(LmError::Config(format!(
                "learning_rate and clip must be > 0 (got {} / {})",
                self.learning_rate, self.clip
            )));
        }
        if self.log_every == 0 {
            return Err(LmError::Config("log_every must be > 0".into()));
        }
        Ok(())
    }
}

/// Per-epoch state threaded through the epoch driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingState {
    pub epoch: usize,
    pub learning_rate: f64,
}

impl TrainingState {
    pub fn new(config: &TrainingConfig) -> Self {
        Self {
            epoch: 0,
            learning_rate: config.learning_rate,
        }
    }

    /// State for the next epoch, with the decayed learning rate.
    pub fn decayed(self, factor: f64) -> Self {
        Self {
            epoch: self.epoch + 1,
            learning_rate: self.learning_rate * factor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli() {
        let model = ModelConfig::new();
        assert_eq!(model.rnn_type, RnnType::Gru);
        assert_eq!(model.rnn_size, 1024);
        assert_eq!(model.embed_size, 128);

        let train = TrainingConfig::new();
        assert_eq!(train.seq_length, 20);
        assert_eq!(train.batch_size, 64);
        assert_eq!(train.clip_mode, ClipMode::Value);
        assert!(train.validate().is_ok());
    }

    #[test]
    fn test_lr_decay_is_explicit() {
        let config = TrainingConfig::new().with_learning_rate(1.0);
        let state = TrainingState::new(&config).decayed(0.7).decayed(0.7);

        assert_eq!(state.epoch, 2);
        assert!((state.learning_rate - 0.49).abs() < 1e-12);
        assert_eq!(config.learning_rate, 1.0);
    }

    #[test]
    fn test_invalid_model_config() {
        assert!(ModelConfig::new().with_layers(0).validate().is_err());
        assert!(ModelConfig::new().with_dropout(1.0).validate().is_err());
    }

    #[test]
    fn test_config_json_roundtrip() {
        let config = ModelConfig::new().with_rnn_type(RnnType::MLstm).with_layers(3);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"mlstm\""));

        let back: ModelConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.rnn_type, RnnType::MLstm);
        assert_eq!(back.layers, 3);
    }
}
