//! Single-step recurrent cells.
//!
//! GRU and LSTM delegate the gate arithmetic to `burn::nn` run over a
//! one-step sequence; mLSTM lives in `mlstm.rs`.

use burn::{
    module::Module,
    nn::{
        gru::{Gru, GruConfig},
        Initializer, Lstm, LstmConfig, LstmState,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::error::{LmError, Result};

use super::config::RnnType;
use super::mlstm::MLstmCell;
use super::state::LayerState;

#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    gru: Gru<B>,
    d_hidden: usize,
}

impl<B: Backend> GruCell<B> {
    pub fn new(d_input: usize, d_hidden: usize, initializer: Initializer, device: &B::Device) -> Self {
        Self {
            gru: GruConfig::new(d_input, d_hidden, true)
                .with_initializer(initializer)
                .init(device),
            d_hidden,
        }
    }

    /// The state goes in as a one-step `[batch, 1, hidden]` sequence.
    pub fn forward(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        let [batch, _] = input.dims();
        self.gru
            .forward(input.unsqueeze_dim(1), Some(hidden.unsqueeze_dim(1)))
            .reshape([batch, self.d_hidden])
    }
}

#[derive(Module, Debug)]
pub struct LstmCell<B: Backend> {
    lstm: Lstm<B>,
    d_hidden: usize,
}

impl<B: Backend> LstmCell<B> {
    pub fn new(d_input: usize, d_hidden: usize, initializer: Initializer, device: &B::Device) -> Self {
        Self {
            lstm: LstmConfig::new(d_input, d_hidden, true)
                .with_initializer(initializer)
                .init(device),
            d_hidden,
        }
    }

    /// Returns `(cell, hidden)`.
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        cell: Tensor<B, 2>,
        hidden: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let (_, state) = self
            .lstm
            .forward(input.unsqueeze_dim(1), Some(LstmState::new(cell, hidden)));
        (state.cell, state.hidden)
    }
}

/// One layer of the stack
#[derive(Module, Debug)]
pub enum RecurrentCell<B: Backend> {
    Gru(GruCell<B>),
    Lstm(LstmCell<B>),
    MLstm(MLstmCell<B>),
}

impl<B: Backend> RecurrentCell<B> {
    pub fn new(
        kind: RnnType,
        d_input: usize,
        d_hidden: usize,
        initializer: Initializer,
        device: &B::Device,
    ) -> Self {
        match kind {
            RnnType::Gru => Self::Gru(GruCell::new(d_input, d_hidden, initializer, device)),
            RnnType::Lstm => Self::Lstm(LstmCell::new(d_input, d_hidden, initializer, device)),
            RnnType::MLstm => Self::MLstm(MLstmCell::new(d_input, d_hidden, initializer, device)),
        }
    }

    pub fn kind(&self) -> RnnType {
        match self {
            Self::Gru(_) => RnnType::Gru,
            Self::Lstm(_) => RnnType::Lstm,
            Self::MLstm(_) => RnnType::MLstm,
        }
    }

    pub fn d_hidden(&self) -> usize {
        match self {
            Self::Gru(c) => c.d_hidden,
            Self::Lstm(c) => c.d_hidden,
            Self::MLstm(c) => c.d_hidden(),
        }
    }

    /// Zero state of the variant this cell consumes and produces.
    pub fn zero_state(&self, batch_size: usize, device: &B::Device) -> LayerState<B> {
        let shape = [batch_size, self.d_hidden()];
        match self {
            Self::Gru(_) => LayerState::Single(Tensor::zeros(shape, device)),
            Self::Lstm(_) | Self::MLstm(_) => LayerState::Paired {
                cell: Tensor::zeros(shape, device),
                hidden: Tensor::zeros(shape, device),
            },
        }
    }

    /// One timestep for layer `layer`. A state of the wrong variant is an
    /// error, never reinterpreted.
    pub fn forward(&self, layer: usize, input: Tensor<B, 2>, state: LayerState<B>) -> Result<LayerState<B>> {
        match (self, state) {
            (Self::Gru(c), LayerState::Single(h)) => Ok(LayerState::Single(c.forward(input, h))),
            (Self::Lstm(c), LayerState::Paired { cell, hidden }) => {
                let (cell, hidden) = c.forward(input, cell, hidden);
                Ok(LayerState::Paired { cell, hidden })
            }
            (Self::MLstm(c), LayerState::Paired { cell, hidden }) => {
                let (cell, hidden) = c.forward(input, cell, hidden);
                Ok(LayerState::Paired { cell, hidden })
            }
            (cell, state) => Err(LmError::StateMismatch {
                layer,
                expected: if matches!(cell, Self::Gru(_)) { "single" } else { "paired" },
                got: state.kind_name(),
            }),
        }
    }
}
