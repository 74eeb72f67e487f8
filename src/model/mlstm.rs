//! Multiplicative LSTM cell.
//!
//! The previous hidden state reaches the gates only through
//! `m = (x·Wmx) ⊙ (h·Wmh)`, so the recurrent transition depends on the
//! current input multiplicatively:
//!
//! ```text
//! z  = x·Wx + m·Wh + b          split as i | f | o | u
//! c' = σ(f) ⊙ c + σ(i) ⊙ tanh(u)
//! h' = σ(o) ⊙ tanh(c')
//! ```

use burn::{
    module::{Module, Param},
    nn::{Initializer, Linear, LinearConfig},
    tensor::{activation, backend::Backend, Tensor},
};

/// Weights of one mLSTM layer, all stored `[d_in, d_out]`.
#[derive(Module, Debug)]
pub struct MLstmCell<B: Backend> {
    /// input → gates, `[d_input, 4 * d_hidden]`, no bias
    pub wx: Linear<B>,
    /// multiplicative hidden → gates, `[d_hidden, 4 * d_hidden]`, gate bias
    pub wh: Linear<B>,
    /// input → multiplicative hidden, `[d_input, d_hidden]`
    pub wmx: Linear<B>,
    /// hidden → multiplicative hidden, `[d_hidden, d_hidden]`
    pub wmh: Linear<B>,
    d_input: usize,
    d_hidden: usize,
}

/// Replacement tensors for `MLstmCell::with_weights`; `None` keeps the
/// current value.
#[derive(Debug, Default)]
pub struct MLstmWeights<B: Backend> {
    pub wx: Option<Tensor<B, 2>>,
    pub wh: Option<Tensor<B, 2>>,
    pub bias: Option<Tensor<B, 1>>,
    pub wmx: Option<Tensor<B, 2>>,
    pub wmh: Option<Tensor<B, 2>>,
}

impl<B: Backend> MLstmCell<B> {
    pub fn new(
        d_input: usize,
        d_hidden: usize,
        initializer: Initializer,
        device: &B::Device,
    ) -> Self {
        let linear = |d_in: usize, d_out: usize, bias: bool| {
            LinearConfig::new(d_in, d_out)
                .with_bias(bias)
                .with_initializer(initializer.clone())
                .init(device)
        };

        Self {
            wx: linear(d_input, 4 * d_hidden, false),
            wh: linear(d_hidden, 4 * d_hidden, true),
            wmx: linear(d_input, d_hidden, false),
            wmh: linear(d_hidden, d_hidden, false),
            d_input,
            d_hidden,
        }
    }

    pub fn d_input(&self) -> usize {
        self.d_input
    }

    pub fn d_hidden(&self) -> usize {
        self.d_hidden
    }

    /// `(x·Wmx) ⊙ (h·Wmh)`
    pub fn multiplicative_hidden(&self, input: Tensor<B, 2>, hidden: Tensor<B, 2>) -> Tensor<B, 2> {
        self.wmx.forward(input) * self.wmh.forward(hidden)
    }

    /// One timestep. Returns `(cell, hidden)`.
    pub fn forward(
        &self,
        input: Tensor<B, 2>,
        cell: Tensor<B, 2>,
        hidden: Tensor<B, 2>,
    ) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let [batch, _] = input.dims();
        let h = self.d_hidden;

        let m = self.multiplicative_hidden(input.clone(), hidden);
        let gates = self.wx.forward(input) + self.wh.forward(m);

        let gate = |k: usize| gates.clone().slice([0..batch, k * h..(k + 1) * h]);
        let i = activation::sigmoid(gate(0));
        let f = activation::sigmoid(gate(1));
        let o = activation::sigmoid(gate(2));
        let u = gate(3).tanh();

        let cell = f * cell + i * u;
        let hidden = o * cell.clone().tanh();

        (cell, hidden)
    }

    /// Swaps in externally supplied weights. Shapes are checked by the caller
    /// (see `model::import`).
    pub fn with_weights(mut self, weights: MLstmWeights<B>) -> Self {
        if let Some(w) = weights.wx {
            self.wx.weight = Param::from_tensor(w);
        }
        if let Some(w) = weights.wh {
            self.wh.weight = Param::from_tensor(w);
        }
        if let Some(b) = weights.bias {
            self.wh.bias = Some(Param::from_tensor(b));
        }
        if let Some(w) = weights.wmx {
            self.wmx.weight = Param::from_tensor(w);
        }
        if let Some(w) = weights.wmh {
            self.wmh.weight = Param::from_tensor(w);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::TensorData;

    type TB = NdArray;

    fn t2(values: Vec<f32>, shape: [usize; 2]) -> Tensor<TB, 2> {
        Tensor::from_data(TensorData::new(values, shape), &NdArrayDevice::Cpu)
    }

    fn to_vec(t: Tensor<TB, 2>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    fn sigmoid(x: f32) -> f32 {
        1.0 / (1.0 + (-x).exp())
    }

    /// d = 2, Wmx = I, Wmh = 2I, Wx = 0, bias = 0.
    /// Wh routes m straight into the input gate and the candidate, leaving
    /// f and o at σ(0) = 0.5.
    fn worked_example_cell() -> MLstmCell<TB> {
        let device = NdArrayDevice::Cpu;
        let cell = MLstmCell::<TB>::new(2, 2, Initializer::Zeros, &device);

        #[rustfmt::skip]
        let wh = vec![
            1.0, 0.0,  0.0, 0.0,  0.0, 0.0,  1.0, 0.0,
            0.0, 1.0,  0.0, 0.0,  0.0, 0.0,  0.0, 1.0,
        ];
        cell.with_weights(MLstmWeights {
            wx: Some(t2(vec![0.0; 16], [2, 8])),
            wh: Some(t2(wh, [2, 8])),
            bias: Some(Tensor::zeros([8], &device)),
            wmx: Some(t2(vec![1.0, 0.0, 0.0, 1.0], [2, 2])),
            wmh: Some(t2(vec![2.0, 0.0, 0.0, 2.0], [2, 2])),
        })
    }

    #[test]
    fn test_multiplicative_hidden_is_elementwise_product() {
        let cell = worked_example_cell();
        let x = t2(vec![1.0, 2.0], [1, 2]);
        let h = t2(vec![0.5, -0.5], [1, 2]);

        // [1, 2] ⊙ [1, -1]
        let m = to_vec(cell.multiplicative_hidden(x, h));
        assert!((m[0] - 1.0).abs() < 1e-6);
        assert!((m[1] + 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_gate_equations_worked_example() {
        let cell = worked_example_cell();
        let x = t2(vec![1.0, 2.0], [1, 2]);
        let h = t2(vec![0.5, -0.5], [1, 2]);
        let c = t2(vec![0.1, 0.2], [1, 2]);

        let (c_new, h_new) = cell.forward(x, c, h);
        let (c_new, h_new) = (to_vec(c_new), to_vec(h_new));

        let m = [1.0f32, -2.0];
        let c_prev = [0.1f32, 0.2];
        for k in 0..2 {
            let expected_c = 0.5 * c_prev[k] + sigmoid(m[k]) * m[k].tanh();
            let expected_h = 0.5 * expected_c.tanh();
            assert!((c_new[k] - expected_c).abs() < 1e-5, "cell[{k}]");
            assert!((h_new[k] - expected_h).abs() < 1e-5, "hidden[{k}]");
        }
    }

    #[test]
    fn test_zero_hidden_blocks_recurrence() {
        // h = 0 gives m = 0: gates then depend on x·Wx + b only
        let cell = worked_example_cell();
        let x = t2(vec![3.0, -1.0], [1, 2]);
        let zeros = t2(vec![0.0, 0.0], [1, 2]);

        let (c_new, h_new) = cell.forward(x, zeros.clone(), zeros);
        // i = 0.5, u = tanh(0) = 0
        for v in to_vec(c_new).into_iter().chain(to_vec(h_new)) {
            assert!(v.abs() < 1e-6);
        }
    }
}
