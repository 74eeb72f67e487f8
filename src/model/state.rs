//! Recurrent state carried between timesteps and between batches.

use burn::tensor::{backend::Backend, Tensor};

/// State of one layer. GRU cells produce `Single`, LSTM and mLSTM cells
/// produce `Paired`.
#[derive(Clone, Debug)]
pub enum LayerState<B: Backend> {
    Single(Tensor<B, 2>),
    Paired {
        cell: Tensor<B, 2>,
        hidden: Tensor<B, 2>,
    },
}

impl<B: Backend> LayerState<B> {
    pub fn kind_name(&self) -> &'static str {
        match self {
            LayerState::Single(_) => "single",
            LayerState::Paired { .. } => "paired",
        }
    }

    /// The layer output, `[batch, hidden]`
    pub fn hidden(&self) -> Tensor<B, 2> {
        match self {
            LayerState::Single(h) => h.clone(),
            LayerState::Paired { hidden, .. } => hidden.clone(),
        }
    }

    pub fn dims(&self) -> [usize; 2] {
        match self {
            LayerState::Single(h) => h.dims(),
            LayerState::Paired { hidden, .. } => hidden.dims(),
        }
    }

    pub fn detach(self) -> Self {
        match self {
            LayerState::Single(h) => LayerState::Single(h.detach()),
            LayerState::Paired { cell, hidden } => LayerState::Paired {
                cell: cell.detach(),
                hidden: hidden.detach(),
            },
        }
    }

    pub fn to_device(self, device: &B::Device) -> Self {
        match self {
            LayerState::Single(h) => LayerState::Single(h.to_device(device)),
            LayerState::Paired { cell, hidden } => LayerState::Paired {
                cell: cell.to_device(device),
                hidden: hidden.to_device(device),
            },
        }
    }

    /// True when both states have the same variant and shapes.
    pub fn same_structure(&self, other: &Self) -> bool {
        match (self, other) {
            (LayerState::Single(a), LayerState::Single(b)) => a.dims() == b.dims(),
            (
                LayerState::Paired { cell: c1, hidden: h1 },
                LayerState::Paired { cell: c2, hidden: h2 },
            ) => c1.dims() == c2.dims() && h1.dims() == h2.dims(),
            _ => false,
        }
    }
}

/// One `LayerState` per layer of the stack
#[derive(Clone, Debug)]
pub struct StackedState<B: Backend> {
    layers: Vec<LayerState<B>>,
}

impl<B: Backend> StackedState<B> {
    pub fn new(layers: Vec<LayerState<B>>) -> Self {
        Self { layers }
    }

    pub fn layers(&self) -> &[LayerState<B>] {
        &self.layers
    }

    pub fn into_layers(self) -> Vec<LayerState<B>> {
        self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Output of the top layer
    pub fn top_hidden(&self) -> Option<Tensor<B, 2>> {
        self.layers.last().map(LayerState::hidden)
    }

    /// State continuity without gradient continuity: keeps every value and
    /// drops the autodiff history, so the next batch starts from where this
    /// one ended while its backward pass stops at the batch boundary.
    pub fn detach(self) -> Self {
        Self {
            layers: self.layers.into_iter().map(LayerState::detach).collect(),
        }
    }

    pub fn to_device(self, device: &B::Device) -> Self {
        Self {
            layers: self
                .layers
                .into_iter()
                .map(|l| l.to_device(device))
                .collect(),
        }
    }

    pub fn same_structure(&self, other: &Self) -> bool {
        self.layers.len() == other.layers.len()
            && self
                .layers
                .iter()
                .zip(other.layers.iter())
                .all(|(a, b)| a.same_structure(b))
    }
}
