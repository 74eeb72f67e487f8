//! Stacked recurrent network: N cells of one type, dropout between layers,
//! and a projection from the top hidden state to byte logits.

use burn::{
    config::Config,
    module::Module,
    nn::{Dropout, DropoutConfig, Embedding, Initializer, Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};

use crate::error::{LmError, Result as LmResult};
use crate::tokenizer::VOCAB_SIZE;

use super::cell::RecurrentCell;
use super::config::RnnType;
use super::state::StackedState;

#[derive(Config, Debug)]
pub struct StackedRnnConfig {
    pub rnn_type: RnnType,
    pub layers: usize,
    pub input_size: usize,
    pub hidden_size: usize,
    #[config(default = "256")]
    pub output_size: usize,
    #[config(default = "0.0")]
    pub dropout: f64,
    #[config(default = "0.05")]
    pub param_init: f64,
}

impl StackedRnnConfig {
    /// Builds the stack. Bad dimensions fail here, never inside `step`.
    pub fn init<B: Backend>(&self, device: &B::Device) -> LmResult<StackedRnn<B>> {
        if self.layers == 0 {
            return Err(LmError::Config("a stack needs at least one layer".into()));
        }
        if self.input_size == 0 || self.hidden_size == 0 {
            return Err(LmError::Config(format!(
                "input_size and hidden_size must be > 0 (got {} / {})",
                self.input_size, self.hidden_size
            )));
        }
        if self.output_size != VOCAB_SIZE {
            return Err(LmError::ShapeMismatch {
                expected: format!("output_size {}", VOCAB_SIZE),
                got: format!("output_size {}", self.output_size),
            });
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(LmError::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }

        let initializer = Initializer::Uniform {
            min: -self.param_init,
            max: self.param_init,
        };

        let cells = (0..self.layers)
            .map(|i| {
                let d_input = if i == 0 { self.input_size } else { self.hidden_size };
                RecurrentCell::new(self.rnn_type, d_input, self.hidden_size, initializer.clone(), device)
            })
            .collect();

        Ok(StackedRnn {
            cells,
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.output_size)
                .with_initializer(initializer)
                .init(device),
            input_size: self.input_size,
            hidden_size: self.hidden_size,
        })
    }
}

#[derive(Module, Debug)]
pub struct StackedRnn<B: Backend> {
    pub(crate) cells: Vec<RecurrentCell<B>>,
    dropout: Dropout,
    pub(crate) output: Linear<B>,
    input_size: usize,
    hidden_size: usize,
}

impl<B: Backend> StackedRnn<B> {
    pub fn rnn_type(&self) -> RnnType {
        self.cells[0].kind()
    }

    pub fn num_layers(&self) -> usize {
        self.cells.len()
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Fresh all-zero state, one entry per layer.
    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> StackedState<B> {
        StackedState::new(
            self.cells
                .iter()
                .map(|c| c.zero_state(batch_size, device))
                .collect(),
        )
    }

    /// One timestep through every layer.
    ///
    /// `input` is `[batch, input_size]`; returns the new state and the
    /// logits `[batch, 256]`. Dropout sits between layers only (and is only
    /// active under autodiff); the projection sees the top hidden state as is.
    pub fn step(
        &self,
        input: Tensor<B, 2>,
        state: StackedState<B>,
    ) -> LmResult<(StackedState<B>, Tensor<B, 2>)> {
        if state.len() != self.cells.len() {
            return Err(LmError::ShapeMismatch {
                expected: format!("{} layer states", self.cells.len()),
                got: format!("{}", state.len()),
            });
        }

        let last = self.cells.len() - 1;
        let mut x = input;
        let mut next = Vec::with_capacity(self.cells.len());
        for (i, (cell, layer_state)) in self.cells.iter().zip(state.into_layers()).enumerate() {
            let new_state = cell.forward(i, x, layer_state)?;
            x = if i < last {
                self.dropout.forward(new_state.hidden())
            } else {
                new_state.hidden()
            };
            next.push(new_state);
        }

        let logits = self.output.forward(x);
        Ok((StackedState::new(next), logits))
    }

    /// The embedding feeding this stack must produce `input_size` features
    /// for each of the 256 byte ids.
    pub fn check_embedding(&self, embed: &Embedding<B>) -> LmResult<()> {
        let [rows, width] = embed.weight.val().dims();
        if rows != VOCAB_SIZE || width != self.input_size {
            return Err(LmError::ShapeMismatch {
                expected: format!("embedding [{}, {}]", VOCAB_SIZE, self.input_size),
                got: format!("embedding [{}, {}]", rows, width),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};

    type TB = NdArray;

    #[test]
    fn test_projection_must_match_vocab() {
        let result = StackedRnnConfig::new(RnnType::Gru, 1, 8, 16)
            .with_output_size(100)
            .init::<TB>(&NdArrayDevice::Cpu);
        assert!(matches!(result, Err(LmError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_zero_layers_rejected() {
        let result = StackedRnnConfig::new(RnnType::Lstm, 0, 8, 16).init::<TB>(&NdArrayDevice::Cpu);
        assert!(matches!(result, Err(LmError::Config(_))));
    }

    #[test]
    fn test_state_layer_count_checked() {
        let device = NdArrayDevice::Cpu;
        let one = StackedRnnConfig::new(RnnType::Gru, 1, 4, 8).init::<TB>(&device).unwrap();
        let two = StackedRnnConfig::new(RnnType::Gru, 2, 4, 8).init::<TB>(&device).unwrap();

        let state = two.zero_state(3, &device);
        let input = Tensor::zeros([3, 4], &device);
        assert!(one.step(input, state).is_err());
    }

    #[test]
    fn test_state_variant_checked() {
        let device = NdArrayDevice::Cpu;
        let gru = StackedRnnConfig::new(RnnType::Gru, 1, 4, 8).init::<TB>(&device).unwrap();
        let lstm = StackedRnnConfig::new(RnnType::Lstm, 1, 4, 8).init::<TB>(&device).unwrap();

        let paired = lstm.zero_state(2, &device);
        let err = gru.step(Tensor::zeros([2, 4], &device), paired).unwrap_err();
        assert!(matches!(err, LmError::StateMismatch { layer: 0, .. }));
    }

    #[test]
    fn test_projection_sees_top_hidden_without_dropout() {
        type AD = burn::backend::Autodiff<NdArray>;
        let device = NdArrayDevice::Cpu;

        for layers in [1, 3] {
            let rnn = StackedRnnConfig::new(RnnType::Gru, layers, 4, 8)
                .with_dropout(0.5)
                .init::<AD>(&device)
                .unwrap();
            let input = Tensor::<AD, 2>::ones([3, 4], &device);

            let (state, logits) = rnn.step(input, rnn.zero_state(3, &device)).unwrap();
            let top = state.top_hidden().unwrap();
            let expected = rnn.output.forward(top);

            logits.into_data().assert_approx_eq(&expected.into_data(), 6);
        }
    }
}
