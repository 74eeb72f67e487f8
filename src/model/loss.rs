use burn::tensor::{activation, backend::Backend, Int, Tensor};

/// Mean negative log-likelihood of `targets` under `logits`.
///
/// `logits` is `[batch, vocab]`, `targets` is `[batch]`.
pub fn cross_entropy<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> Tensor<B, 1> {
    // log-softmax first for numerical stability
    let log_probs = activation::log_softmax(logits, 1);

    // log-prob of the target byte
    let selected = log_probs.gather(1, targets.unsqueeze_dim(1));

    selected.mean().neg()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::{NdArray, NdArrayDevice};
    use burn::tensor::{ElementConversion, TensorData};

    type TB = NdArray;

    #[test]
    fn test_uniform_logits_give_log_vocab() {
        let device = NdArrayDevice::Cpu;
        let logits = Tensor::<TB, 2>::zeros([3, 256], &device);
        let targets = Tensor::<TB, 1, Int>::from_data(TensorData::new(vec![0i32, 97, 255], [3]), &device);

        let loss: f32 = cross_entropy(logits, targets).into_scalar().elem();
        assert!((loss - (256f32).ln()).abs() < 1e-4);
    }

    #[test]
    fn test_confident_correct_prediction_is_near_zero() {
        let device = NdArrayDevice::Cpu;
        let mut values = vec![0.0f32; 4];
        values[2] = 50.0;
        let logits = Tensor::<TB, 2>::from_data(TensorData::new(values, [1, 4]), &device);
        let targets = Tensor::<TB, 1, Int>::from_data(TensorData::new(vec![2i32], [1]), &device);

        let loss: f32 = cross_entropy(logits, targets).into_scalar().elem();
        assert!(loss < 1e-4);
    }
}
