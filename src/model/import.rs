//! Named-parameter import for pretrained weights.
//!
//! Arrays are addressed by stable names, independent of how the modules
//! nest internally:
//!
//! | name               | shape                   |
//! |--------------------|-------------------------|
//! | `embed.weight`     | `[256, embed]`          |
//! | `output.weight`    | `[hidden, 256]`         |
//! | `output.bias`      | `[256]`                 |
//! | `layers.{i}.wx`    | `[d_in, 4 * hidden]`    |
//! | `layers.{i}.wh`    | `[hidden, 4 * hidden]`  |
//! | `layers.{i}.bias`  | `[4 * hidden]`          |
//! | `layers.{i}.wmx`   | `[d_in, hidden]`        |
//! | `layers.{i}.wmh`   | `[hidden, hidden]`      |
//!
//! Only mLSTM layers accept per-layer weights. Every entry is checked before
//! anything is assigned, so a failed import leaves the model untouched.

use std::collections::BTreeMap;
use std::path::Path;

use burn::{
    module::Param,
    nn::Embedding,
    tensor::{backend::Backend, Tensor, TensorData},
};
use ndarray::ArrayD;

use crate::error::{LmError, Result};
use crate::tokenizer::VOCAB_SIZE;

use super::cell::RecurrentCell;
use super::mlstm::MLstmWeights;
use super::stacked::StackedRnn;

/// `.npy` files of the OpenAI sentiment-neuron release, with the name each
/// one imports as. All go into layer 0.
const NPY_LAYOUT: [(&str, &str); 8] = [
    ("embd.npy", "embed.weight"),
    ("w.npy", "output.weight"),
    ("b.npy", "output.bias"),
    ("wx.npy", "layers.0.wx"),
    ("wh.npy", "layers.0.wh"),
    ("b0.npy", "layers.0.bias"),
    ("wmx.npy", "layers.0.wmx"),
    ("wmh.npy", "layers.0.wmh"),
];

const LAYER_PARAMS: [&str; 5] = ["wx", "wh", "bias", "wmx", "wmh"];

/// A dense f32 array in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct WeightArray {
    shape: Vec<usize>,
    values: Vec<f32>,
}

impl WeightArray {
    pub fn new(shape: Vec<usize>, values: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(LmError::ShapeMismatch {
                expected: format!("{} values for shape {:?}", expected, shape),
                got: format!("{} values", values.len()),
            });
        }
        Ok(Self { shape, values })
    }

    pub fn from_npy(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(LmError::FileNotFound(path.to_path_buf()));
        }
        let array: ArrayD<f32> =
            ndarray_npy::read_npy(path).map_err(|e| LmError::WeightImport {
                name: path.display().to_string(),
                reason: e.to_string(),
            })?;
        let shape = array.shape().to_vec();
        let values = array.iter().copied().collect();
        Self::new(shape, values)
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }
}

/// Name → array mapping applied onto an embedding and a stack
#[derive(Debug, Clone, Default)]
pub struct WeightImport {
    arrays: BTreeMap<String, WeightArray>,
}

impl WeightImport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, array: WeightArray) {
        self.arrays.insert(name.into(), array);
    }

    pub fn with(mut self, name: impl Into<String>, array: WeightArray) -> Self {
        self.insert(name, array);
        self
    }

    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.keys().map(String::as_str)
    }

    /// Reads the single-layer mLSTM release from `dir`. All eight files must
    /// be present.
    pub fn from_npy_dir(dir: &Path) -> Result<Self> {
        let mut import = Self::new();
        for (file, name) in NPY_LAYOUT {
            import.insert(name, WeightArray::from_npy(&dir.join(file))?);
        }
        tracing::info!("Read {} pretrained arrays from {}", import.len(), dir.display());
        Ok(import)
    }

    fn tensor<B: Backend, const D: usize>(
        &self,
        name: &str,
        expected: [usize; D],
        device: &B::Device,
    ) -> Result<Option<Tensor<B, D>>> {
        let Some(array) = self.arrays.get(name) else {
            return Ok(None);
        };
        if array.shape != expected {
            return Err(LmError::WeightImport {
                name: name.to_string(),
                reason: format!("expected shape {:?}, got {:?}", expected, array.shape),
            });
        }
        let data = TensorData::new(array.values.clone(), expected);
        Ok(Some(Tensor::from_data(data, device)))
    }

    fn check_names<B: Backend>(&self, rnn: &StackedRnn<B>) -> Result<()> {
        for name in self.arrays.keys() {
            let known = match name.as_str() {
                "embed.weight" | "output.weight" | "output.bias" => true,
                other => match parse_layer_name(other) {
                    Some((i, _)) if i < rnn.num_layers() => {
                        if !matches!(rnn.cells[i], RecurrentCell::MLstm(_)) {
                            return Err(LmError::WeightImport {
                                name: name.clone(),
                                reason: format!(
                                    "layer {} is a {} cell; only mlstm layers take imported weights",
                                    i,
                                    rnn.cells[i].kind()
                                ),
                            });
                        }
                        true
                    }
                    _ => false,
                },
            };
            if !known {
                return Err(LmError::WeightImport {
                    name: name.clone(),
                    reason: "no parameter with this name".into(),
                });
            }
        }
        Ok(())
    }

    /// Validates every entry against the model, then assigns them.
    pub fn apply<B: Backend>(
        &self,
        mut embed: Embedding<B>,
        mut rnn: StackedRnn<B>,
        device: &B::Device,
    ) -> Result<(Embedding<B>, StackedRnn<B>)> {
        self.check_names(&rnn)?;

        let h = rnn.hidden_size();
        let embed_weight = self.tensor::<B, 2>("embed.weight", [VOCAB_SIZE, rnn.input_size()], device)?;
        let output_weight = self.tensor::<B, 2>("output.weight", [h, VOCAB_SIZE], device)?;
        let output_bias = self.tensor::<B, 1>("output.bias", [VOCAB_SIZE], device)?;

        let mut layer_weights = Vec::with_capacity(rnn.num_layers());
        for (i, cell) in rnn.cells.iter().enumerate() {
            let RecurrentCell::MLstm(cell) = cell else {
                layer_weights.push(None);
                continue;
            };
            let d_in = cell.d_input();
            let key = |p: &str| format!("layers.{}.{}", i, p);
            layer_weights.push(Some(MLstmWeights {
                wx: self.tensor::<B, 2>(&key("wx"), [d_in, 4 * h], device)?,
                wh: self.tensor::<B, 2>(&key("wh"), [h, 4 * h], device)?,
                bias: self.tensor::<B, 1>(&key("bias"), [4 * h], device)?,
                wmx: self.tensor::<B, 2>(&key("wmx"), [d_in, h], device)?,
                wmh: self.tensor::<B, 2>(&key("wmh"), [h, h], device)?,
            }));
        }

        // Everything validated; assign.
        if let Some(w) = embed_weight {
            embed.weight = Param::from_tensor(w);
        }
        if let Some(w) = output_weight {
            rnn.output.weight = Param::from_tensor(w);
        }
        if let Some(b) = output_bias {
            rnn.output.bias = Some(Param::from_tensor(b));
        }
        rnn.cells = rnn
            .cells
            .into_iter()
            .zip(layer_weights)
            .map(|(cell, weights)| match (cell, weights) {
                (RecurrentCell::MLstm(c), Some(w)) => RecurrentCell::MLstm(c.with_weights(w)),
                (cell, _) => cell,
            })
            .collect();

        tracing::info!("Imported {} named parameters", self.len());
        Ok((embed, rnn))
    }
}

/// `layers.{i}.{param}` → `(i, param)`
fn parse_layer_name(name: &str) -> Option<(usize, &str)> {
    let rest = name.strip_prefix("layers.")?;
    let (index, param) = rest.split_once('.')?;
    let index = index.parse().ok()?;
    LAYER_PARAMS.contains(&param).then_some((index, param))
}
