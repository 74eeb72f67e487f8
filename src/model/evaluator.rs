//! Validation loss over a batched corpus, same unrolling as training.

use std::time::Instant;

use burn::{
    nn::Embedding,
    tensor::{backend::Backend, ElementConversion, Tensor},
};

use crate::data::BatchedCorpus;
use crate::error::Result;

use super::loss::cross_entropy;
use super::stacked::StackedRnn;

/// Validation metrics
#[derive(Debug, Clone, Default)]
pub struct EvalMetrics {
    /// Mean per-timestep loss over the batches evaluated
    pub loss: f32,
    pub perplexity: f32,
    pub batches: usize,
}

impl std::fmt::Display for EvalMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Loss: {:.4} | PPL: {:.2} | Batches: {}",
            self.loss, self.perplexity, self.batches
        )
    }
}

pub struct Evaluator {
    seq_length: usize,
    log_every: usize,
}

impl Evaluator {
    pub fn new(seq_length: usize, log_every: usize) -> Self {
        Self {
            seq_length,
            log_every: log_every.max(1),
        }
    }

    /// Runs windows `0 .. n_batch - 1` with state carried between them.
    /// No backward pass; call it with `valid()` modules to also skip graph
    /// recording and dropout.
    ///
    /// The loss is averaged over the `n_batch - 1` windows actually run, not
    /// over `n_batch`. It therefore reads slightly higher than a sum divided
    /// by `n_batch`, and that is the value printed into the per-epoch
    /// checkpoint name.
    pub fn evaluate<B: Backend>(
        &self,
        embed: &Embedding<B>,
        rnn: &StackedRnn<B>,
        corpus: &BatchedCorpus,
        device: &B::Device,
    ) -> Result<EvalMetrics> {
        let seq = self.seq_length;
        let n_batch = corpus.num_batches(seq);
        let batch_size = corpus.batch_size();

        let mut hidden_init = rnn.zero_state(batch_size, device);
        let mut total = 0.0f64;
        let mut batches = 0usize;

        for s in 0..n_batch.saturating_sub(1) {
            let start = Instant::now();
            let batch = corpus.bptt_window::<B>(s, seq, device);
            let mut hidden = hidden_init;
            let mut loss = Tensor::<B, 1>::zeros([1], device);

            for t in 0..seq {
                let tokens = batch.clone().slice([t..t + 1, 0..batch_size]).reshape([batch_size, 1]);
                let targets = batch.clone().slice([t + 1..t + 2, 0..batch_size]).reshape([batch_size]);
                let emb = embed.forward(tokens).reshape([batch_size, rnn.input_size()]);

                let (next, output) = rnn.step(emb, hidden)?;
                hidden = next;
                loss = loss + cross_entropy(output, targets);
            }

            hidden_init = hidden.detach();
            let step_loss = loss.into_scalar().elem::<f32>() / seq as f32;
            total += step_loss as f64;
            batches += 1;

            if s % self.log_every == 0 {
                tracing::info!(
                    "v {} / {} loss {:.4} loss avg {:.4} time {:.4}",
                    s,
                    n_batch,
                    step_loss,
                    total / batches as f64,
                    start.elapsed().as_secs_f64()
                );
            }
        }

        let loss = if batches > 0 { (total / batches as f64) as f32 } else { 0.0 };
        Ok(EvalMetrics {
            loss,
            perplexity: loss.exp(),
            batches,
        })
    }
}
