//! Truncated-BPTT trainer.
//!
//! The training corpus is one continuous stream per batch column. Each batch
//! unrolls `seq_length` steps from the state the previous batch ended in,
//! backpropagates once, and hands its final state to the next batch with
//! the gradient history cut off.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use burn::{
    module::{AutodiffModule, Module},
    nn::Embedding,
    optim::{adaptor::OptimizerAdaptor, GradientsParams, Optimizer, Sgd, SgdConfig},
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};

use crate::data::BatchedCorpus;
use crate::error::{LmError, Result};
use crate::utils::format_params;

use super::checkpoint::{Checkpoint, CheckpointPaths, LoadedCheckpoint};
use super::config::{ModelConfig, TrainingConfig, TrainingState};
use super::evaluator::{EvalMetrics, Evaluator};
use super::grad::{clip_gradients, grad_norm};
use super::loss::cross_entropy;
use super::stacked::StackedRnn;

/// Polled by the trainer before every batch.
pub trait StopSignal {
    /// `batch` is the index of the batch about to run.
    fn should_stop(&self, batch: usize) -> bool;
}

/// The Ctrl-C flag set by the binary's signal handler
impl StopSignal for AtomicBool {
    fn should_stop(&self, _batch: usize) -> bool {
        self.load(Ordering::SeqCst)
    }
}

/// Outcome of one training epoch
#[derive(Debug, Clone)]
pub struct EpochReport {
    pub epoch: usize,
    /// Per-timestep loss of every batch run, in order
    pub losses: Vec<f32>,
    /// Pre-clip gradient norm of the last batch
    pub grad_norm: f64,
    /// Stopped early on the interrupt flag
    pub interrupted: bool,
}

impl EpochReport {
    pub fn batches(&self) -> usize {
        self.losses.len()
    }

    pub fn mean_loss(&self) -> f32 {
        if self.losses.is_empty() {
            0.0
        } else {
            self.losses.iter().sum::<f32>() / self.losses.len() as f32
        }
    }
}

/// Checkpoint written at the end of an epoch
#[derive(Debug, Clone)]
pub struct EpochSummary {
    pub report: EpochReport,
    pub valid: EvalMetrics,
    pub checkpoint: PathBuf,
}

pub struct Trainer<B: AutodiffBackend> {
    pub embed: Embedding<B>,
    pub rnn: StackedRnn<B>,
    embed_optimizer: OptimizerAdaptor<Sgd<B::InnerBackend>, Embedding<B>, B>,
    rnn_optimizer: OptimizerAdaptor<Sgd<B::InnerBackend>, StackedRnn<B>, B>,
    model_config: ModelConfig,
    config: TrainingConfig,
    device: B::Device,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Fresh, seeded model.
    pub fn new(model_config: ModelConfig, config: TrainingConfig, device: B::Device) -> Result<Self> {
        model_config.validate()?;
        B::seed(config.seed);

        let embed = model_config.init_embedding::<B>(&device);
        let rnn = model_config.stacked().init::<B>(&device)?;
        Self::from_parts(embed, rnn, model_config, config, device)
    }

    /// Resumes from a checkpoint, keeping the checkpoint's architecture.
    pub fn from_checkpoint(loaded: LoadedCheckpoint<B>, config: TrainingConfig, device: B::Device) -> Result<Self> {
        Self::from_parts(loaded.embed, loaded.rnn, loaded.model, config, device)
    }

    pub fn from_parts(
        embed: Embedding<B>,
        rnn: StackedRnn<B>,
        model_config: ModelConfig,
        config: TrainingConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        rnn.check_embedding(&embed)?;

        tracing::info!(
            "Model: {} x{} (hidden {}, embed {}), {} parameters",
            rnn.rnn_type(),
            rnn.num_layers(),
            rnn.hidden_size(),
            rnn.input_size(),
            format_params(rnn.num_params() + embed.num_params())
        );

        Ok(Self {
            embed,
            rnn,
            embed_optimizer: SgdConfig::new().init(),
            rnn_optimizer: SgdConfig::new().init(),
            model_config,
            config,
            device,
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn model_config(&self) -> &ModelConfig {
        &self.model_config
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    pub fn save_checkpoint(&self, path: &Path, epoch: Option<usize>) -> Result<()> {
        Checkpoint::save(path, &self.embed, &self.rnn, &self.model_config, &self.config, epoch)
    }

    /// One pass over `corpus`. The interrupt flag is polled between batches
    /// only; a batch that has started always completes.
    pub fn train_epoch<S: StopSignal + ?Sized>(
        &mut self,
        corpus: &BatchedCorpus,
        state: TrainingState,
        temp_checkpoint: Option<&Path>,
        interrupt: &S,
    ) -> Result<EpochReport> {
        let seq = self.config.seq_length;
        let batch_size = corpus.batch_size();
        let n_batch = corpus.num_batches(seq);
        let save_interval = (n_batch / 10).max(1);
        let lr = state.learning_rate;

        tracing::info!(
            "Epoch {}: {} batches of {} x {}, lr {:.2e}",
            state.epoch,
            n_batch,
            seq,
            batch_size,
            lr
        );

        let mut hidden_init = self.rnn.zero_state(batch_size, &self.device);
        let mut report = EpochReport {
            epoch: state.epoch,
            losses: Vec::with_capacity(n_batch),
            grad_norm: 0.0,
            interrupted: false,
        };
        let mut loss_avg = 0.0f32;

        for s in 0..n_batch.saturating_sub(1) {
            if interrupt.should_stop(s) {
                tracing::warn!("Exiting from training early (epoch {}, batch {})", state.epoch, s);
                report.interrupted = true;
                break;
            }

            let start = Instant::now();
            let batch = corpus.bptt_window::<B>(s, seq, &self.device);
            let mut hidden = hidden_init;
            let mut loss = Tensor::<B, 1>::zeros([1], &self.device);

            for t in 0..seq {
                let tokens = batch.clone().slice([t..t + 1, 0..batch_size]).reshape([batch_size, 1]);
                let targets = batch.clone().slice([t + 1..t + 2, 0..batch_size]).reshape([batch_size]);
                let emb = self.embed.forward(tokens).reshape([batch_size, self.rnn.input_size()]);

                let (next, output) = self.rnn.step(emb, hidden)?;
                hidden = next;
                loss = loss + cross_entropy(output, targets);
            }

            let step_loss = loss.clone().into_scalar().elem::<f32>() / seq as f32;
            if !step_loss.is_finite() {
                return Err(LmError::Diverged {
                    epoch: state.epoch,
                    batch: s,
                });
            }

            let mut grads = loss.backward();
            hidden_init = hidden.detach();

            let rnn_grads = GradientsParams::from_module(&mut grads, &self.rnn);
            let embed_grads = GradientsParams::from_module(&mut grads, &self.embed);

            let gn = grad_norm::<B, _>(&self.rnn, &rnn_grads);
            let rnn_grads = clip_gradients::<B, _>(&self.rnn, rnn_grads, self.config.clip_mode, self.config.clip);
            let embed_grads = clip_gradients::<B, _>(&self.embed, embed_grads, self.config.clip_mode, self.config.clip);

            self.embed = self.embed_optimizer.step(lr, self.embed.clone(), embed_grads);
            self.rnn = self.rnn_optimizer.step(lr, self.rnn.clone(), rnn_grads);

            loss_avg = 0.99 * loss_avg + 0.01 * step_loss;
            report.losses.push(step_loss);
            report.grad_norm = gn;

            if s % self.config.log_every == 0 {
                tracing::info!(
                    "e{} {} / {} loss {:.4} loss avg {:.4} time {:.4} grad_norm {:.4}",
                    state.epoch,
                    s,
                    n_batch,
                    step_loss,
                    loss_avg,
                    start.elapsed().as_secs_f64(),
                    gn
                );
            }

            if s % save_interval == 0 {
                if let Some(path) = temp_checkpoint {
                    self.save_checkpoint(path, None)?;
                }
            }
        }

        Ok(report)
    }

    /// Validation loss on the inner backend (no graph, no dropout).
    pub fn evaluate(&self, corpus: &BatchedCorpus) -> Result<EvalMetrics> {
        let evaluator = Evaluator::new(self.config.seq_length, self.config.log_every);
        evaluator.evaluate(&self.embed.valid(), &self.rnn.valid(), corpus, &self.device)
    }

    /// Epoch driver: train, evaluate, save `{name}_e{epoch}_{loss}.pt`,
    /// decay the learning rate. An interrupted epoch is still evaluated and
    /// saved, then training stops.
    pub fn fit<S: StopSignal + ?Sized>(
        &mut self,
        train: &BatchedCorpus,
        valid: &BatchedCorpus,
        paths: &CheckpointPaths,
        interrupt: &S,
    ) -> Result<Vec<EpochSummary>> {
        let mut state = TrainingState::new(&self.config);
        let mut summaries = Vec::with_capacity(self.config.epochs);

        for _ in 0..self.config.epochs {
            let report = self.train_epoch(train, state, paths.temp.as_deref(), interrupt)?;
            let valid_metrics = self.evaluate(valid)?;
            tracing::info!("Validation epoch {}: {}", state.epoch, valid_metrics);

            let checkpoint = paths.epoch_file(state.epoch, valid_metrics.loss);
            tracing::info!("Saving to {}", checkpoint.display());
            self.save_checkpoint(&checkpoint, Some(state.epoch))?;

            let interrupted = report.interrupted;
            summaries.push(EpochSummary {
                report,
                valid: valid_metrics,
                checkpoint,
            });
            if interrupted {
                break;
            }
            state = state.decayed(self.config.lr_decay);
        }

        Ok(summaries)
    }
}
