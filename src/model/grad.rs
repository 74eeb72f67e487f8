//! Gradient inspection and clipping over a module's parameters.
//!
//! Two bounding strategies are available: elementwise value clamping
//! (what the training loop applies by default) and global-norm rescaling.

use burn::{
    module::{AutodiffModule, ModuleVisitor, ParamId},
    optim::GradientsParams,
    tensor::{backend::AutodiffBackend, ElementConversion, Tensor},
};

use super::config::ClipMode;

struct SumSquares<'a> {
    grads: &'a GradientsParams,
    total: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for SumSquares<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let sq: f64 = grad.powf_scalar(2.0).sum().into_scalar().elem();
            self.total += sq;
        }
    }
}

struct MaxAbs<'a> {
    grads: &'a GradientsParams,
    max: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for MaxAbs<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.get::<B::InnerBackend, D>(id) {
            let m: f64 = grad.abs().max().into_scalar().elem();
            self.max = self.max.max(m);
        }
    }
}

struct Rewrite<'a> {
    grads: &'a mut GradientsParams,
    mode: ClipMode,
    /// clamp bound for `Value`, scale factor for `Norm`
    amount: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for Rewrite<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, _tensor: &Tensor<B, D>) {
        if let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) {
            let grad = match self.mode {
                ClipMode::Value => grad.clamp(-self.amount, self.amount),
                ClipMode::Norm => grad.mul_scalar(self.amount),
            };
            self.grads.register::<B::InnerBackend, D>(id, grad);
        }
    }
}

/// L2 norm over every gradient belonging to `module`.
pub fn grad_norm<B: AutodiffBackend, M: AutodiffModule<B>>(module: &M, grads: &GradientsParams) -> f64 {
    let mut visitor = SumSquares { grads, total: 0.0 };
    module.visit(&mut visitor);
    visitor.total.sqrt()
}

/// Largest absolute gradient component of `module`.
pub fn max_abs_grad<B: AutodiffBackend, M: AutodiffModule<B>>(module: &M, grads: &GradientsParams) -> f64 {
    let mut visitor = MaxAbs { grads, max: 0.0 };
    module.visit(&mut visitor);
    visitor.max
}

/// `min(1, clip / (norm + 1e-6))`
pub fn clip_coefficient(total_norm: f64, clip: f64) -> f64 {
    (clip / (total_norm + 1e-6)).min(1.0)
}

/// Bounds the gradients of `module` in place of `grads`.
pub fn clip_gradients<B: AutodiffBackend, M: AutodiffModule<B>>(
    module: &M,
    mut grads: GradientsParams,
    mode: ClipMode,
    clip: f64,
) -> GradientsParams {
    let amount = match mode {
        ClipMode::Value => clip,
        ClipMode::Norm => clip_coefficient(grad_norm::<B, M>(module, &grads), clip),
    };
    let mut visitor = Rewrite {
        grads: &mut grads,
        mode,
        amount,
    };
    module.visit(&mut visitor);
    grads
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::backend::Autodiff;
    use burn::tensor::Tensor;

    use crate::model::{RnnType, StackedRnn, StackedRnnConfig};

    type TB = Autodiff<NdArray>;

    fn blown_up_grads(rnn: &StackedRnn<TB>) -> GradientsParams {
        let device = NdArrayDevice::Cpu;
        let state = rnn.zero_state(2, &device);
        let input = Tensor::<TB, 2>::ones([2, 4], &device);
        let (_, logits) = rnn.step(input, state).unwrap();
        let loss = logits.sum() * 1.0e6;
        let mut grads = loss.backward();
        GradientsParams::from_module(&mut grads, rnn)
    }

    #[test]
    fn test_coefficient_caps_at_one() {
        assert_eq!(clip_coefficient(0.5, 5.0), 1.0);
        assert!((clip_coefficient(10.0, 5.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_value_clip_bounds_every_component() {
        let device = NdArrayDevice::Cpu;
        let rnn = StackedRnnConfig::new(RnnType::Lstm, 2, 4, 6)
            .init::<TB>(&device)
            .unwrap();
        let grads = blown_up_grads(&rnn);
        assert!(max_abs_grad(&rnn, &grads) > 0.01);

        let clipped = clip_gradients(&rnn, grads, ClipMode::Value, 0.01);
        assert!(max_abs_grad(&rnn, &clipped) <= 0.01 + 1e-9);
    }

    #[test]
    fn test_norm_clip_bounds_total_norm() {
        let device = NdArrayDevice::Cpu;
        let rnn = StackedRnnConfig::new(RnnType::Gru, 1, 4, 6)
            .init::<TB>(&device)
            .unwrap();
        let grads = blown_up_grads(&rnn);
        assert!(grad_norm(&rnn, &grads) > 5.0);

        let clipped = clip_gradients(&rnn, grads, ClipMode::Norm, 5.0);
        let norm = grad_norm(&rnn, &clipped);
        assert!(norm <= 5.0 * 1.001, "norm after clip: {norm}");
    }
}
