// src/data/batcher.rs
//! Reshapes a flat token stream into `batch_size` parallel streams laid out
//! time-major, so one timestep of every stream is a contiguous row.

use burn::tensor::{backend::Backend, Int, Tensor, TensorData};

use crate::error::{LmError, Result};

/// Token corpus stored as `[steps, batch_size]`, row-major.
#[derive(Debug, Clone)]
pub struct BatchedCorpus {
    data: Vec<u8>,
    steps: usize,
    batch_size: usize,
}

impl BatchedCorpus {
    /// Drops the `len % batch_size` trailing tokens; column `j` is the
    /// contiguous run `tokens[j * steps .. (j + 1) * steps]`.
    pub fn batchify(tokens: &[u8], batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(LmError::Config("batch_size must be > 0".into()));
        }
        let steps = tokens.len() / batch_size;

        // Transpose [batch, steps] -> [steps, batch] into fresh storage
        let mut data = vec![0u8; steps * batch_size];
        for (j, stream) in tokens[..steps * batch_size].chunks_exact(steps.max(1)).enumerate() {
            for (t, &tok) in stream.iter().enumerate() {
                data[t * batch_size + j] = tok;
            }
        }

        Ok(Self {
            data,
            steps,
            batch_size,
        })
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.steps == 0
    }

    /// One timestep across all streams.
    pub fn row(&self, t: usize) -> &[u8] {
        &self.data[t * self.batch_size..(t + 1) * self.batch_size]
    }

    /// Rows `start..start + len` as one contiguous slice.
    pub fn window(&self, start: usize, len: usize) -> &[u8] {
        &self.data[start * self.batch_size..(start + len) * self.batch_size]
    }

    /// Number of `seq_length` windows along the time axis.
    pub fn num_batches(&self, seq_length: usize) -> usize {
        if seq_length == 0 {
            0
        } else {
            self.steps / seq_length
        }
    }

    /// Window `index` of a BPTT pass: `seq_length + 1` rows starting at
    /// `index * seq_length`, the extra row supplying the last targets.
    pub fn bptt_window<B: Backend>(
        &self,
        index: usize,
        seq_length: usize,
        device: &B::Device,
    ) -> Tensor<B, 2, Int> {
        let rows = seq_length + 1;
        let slice = self.window(index * seq_length, rows);

        // Burn CUDA & WGPU backends typically use i32 for Int tensors
        let flat: Vec<i32> = slice.iter().map(|&x| x as i32).collect();
        Tensor::from_data(TensorData::new(flat, [rows, self.batch_size]), device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_remainder() {
        let tokens: Vec<u8> = (0..23).collect();
        let corpus = BatchedCorpus::batchify(&tokens, 4).unwrap();

        assert_eq!(corpus.steps(), 5);
        assert_eq!(corpus.batch_size(), 4);
        assert_eq!(corpus.row(0), &[0, 5, 10, 15]);
        assert_eq!(corpus.row(4), &[4, 9, 14, 19]);
    }

    #[test]
    fn test_window_is_contiguous_rows() {
        let tokens: Vec<u8> = (0..12).collect();
        let corpus = BatchedCorpus::batchify(&tokens, 3).unwrap();

        assert_eq!(corpus.window(1, 2), &[1, 5, 9, 2, 6, 10]);
        assert_eq!(corpus.num_batches(2), 2);
    }

    #[test]
    fn test_too_short_is_empty() {
        let corpus = BatchedCorpus::batchify(&[1, 2, 3], 8).unwrap();
        assert!(corpus.is_empty());
        assert_eq!(corpus.num_batches(4), 0);
    }

    #[test]
    fn test_zero_batch_rejected() {
        assert!(BatchedCorpus::batchify(&[1, 2], 0).is_err());
    }
}
