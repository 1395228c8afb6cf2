//! The sequential network container and its mini-batch SGD training loop.

use std::path::Path;

use crate::losses;
use crate::nn::{Activation, Dense, LayerError};
use crate::serialization::checkpoint::{self, CheckpointError};
use crate::tensor::{Tensor, TensorError};
use rand::rngs::StdRng;

// ============================================================================
// ==== LAYER DISPATCH ====
// ============================================================================

/// One layer of a sequential network.
///
/// The two layer families share no trait; the network dispatches over this
/// closed enum, which also fixes the set of layer kinds a checkpoint can
/// describe.
pub enum Layer {
    Dense(Dense),
    Activation(Activation),
}

impl Layer {
    /// Fully connected layer with randomly initialized weights.
    pub fn dense(
        input_size: usize,
        output_size: usize,
        rng: &mut StdRng,
    ) -> Result<Self, TensorError> {
        Ok(Layer::Dense(Dense::new(input_size, output_size, rng)?))
    }

    pub fn relu() -> Self {
        Layer::Activation(Activation::relu())
    }

    pub fn softmax() -> Self {
        Layer::Activation(Activation::softmax())
    }

    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        match self {
            Layer::Dense(dense) => dense.forward(input),
            Layer::Activation(act) => act.forward(input),
        }
    }

    pub fn backward(
        &mut self,
        grad_output: &Tensor,
        learning_rate: f32,
    ) -> Result<Tensor, LayerError> {
        match self {
            Layer::Dense(dense) => dense.backward(grad_output, learning_rate),
            Layer::Activation(act) => act.backward(grad_output),
        }
    }
}

// ============================================================================
// ==== NETWORK ====
// ============================================================================

/// An ordered stack of layers trained with mini-batch SGD.
#[derive(Default)]
pub struct Network {
    layers: Vec<Layer>,
}

impl Network {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Append a layer to the end of the stack.
    pub fn add(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Run the input through every layer in order.
    ///
    /// Each layer caches what it needs for backward; the intermediate
    /// activations themselves are dropped as soon as the next layer has
    /// consumed them.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let mut current = input.clone();
        for layer in self.layers.iter_mut() {
            current = layer.forward(&current)?;
        }
        Ok(current)
    }

    /// Propagate a loss gradient back through the stack, updating dense
    /// layer parameters in place. Returns the gradient with respect to the
    /// network's input.
    pub fn backward(
        &mut self,
        grad_output: &Tensor,
        learning_rate: f32,
    ) -> Result<Tensor, LayerError> {
        let mut grad = grad_output.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad, learning_rate)?;
        }
        Ok(grad)
    }

    /// Inference-only forward pass.
    pub fn predict(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        self.forward(input)
    }

    /// Train on `(x, y)` with cross-entropy loss for `epochs` passes over
    /// the data.
    ///
    /// Batches are contiguous row slices of size `batch_size`; a trailing
    /// partial batch is processed at its natural size. A batch whose
    /// forward or backward pass fails is reported and skipped rather than
    /// aborting the epoch. The loss gradient fed to backward is the
    /// `predictions - targets` shortcut, which assumes the final layer is
    /// Softmax.
    pub fn train(
        &mut self,
        x: &Tensor,
        y: &Tensor,
        epochs: usize,
        learning_rate: f32,
        batch_size: usize,
    ) -> Result<(), TrainError> {
        if x.ndim() != 2 || y.ndim() != 2 {
            return Err(TensorError::Rank {
                op: "train",
                expected: 2,
                actual: if x.ndim() != 2 { x.ndim() } else { y.ndim() },
            }
            .into());
        }
        if x.shape()[0] != y.shape()[0] {
            return Err(TensorError::ShapeMismatch {
                op: "train",
                lhs: x.shape().to_vec(),
                rhs: y.shape().to_vec(),
            }
            .into());
        }
        if batch_size == 0 {
            return Err(TrainError::EmptyBatch);
        }

        let samples = x.shape()[0];
        for epoch in 0..epochs {
            let mut epoch_loss = 0.0f32;
            let mut batches = 0usize;

            let mut start = 0;
            while start < samples {
                let end = (start + batch_size).min(samples);
                let batch_x = x.slice_rows(start, end)?;
                let batch_y = y.slice_rows(start, end)?;

                match self.train_batch(&batch_x, &batch_y, learning_rate) {
                    Ok(loss) => {
                        epoch_loss += loss;
                        batches += 1;
                    }
                    Err(err) => {
                        println!(
                            "Warning: batch {}..{} failed in epoch {}: {}",
                            start, end, epoch, err
                        );
                    }
                }
                start = end;
            }

            let mean_loss = if batches > 0 {
                epoch_loss / batches as f32
            } else {
                0.0
            };
            println!("Epoch {}: Loss = {}", epoch, mean_loss);
        }
        Ok(())
    }

    /// One SGD step on a single batch; returns the pre-update loss.
    fn train_batch(
        &mut self,
        batch_x: &Tensor,
        batch_y: &Tensor,
        learning_rate: f32,
    ) -> Result<f32, TrainError> {
        let predictions = self.forward(batch_x)?;
        let loss = losses::cross_entropy(&predictions, batch_y)?;
        let grad = losses::cross_entropy_grad(&predictions, batch_y)?;
        self.backward(&grad, learning_rate)?;
        Ok(loss)
    }

    /// Serialize all layer parameters to a checkpoint file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), CheckpointError> {
        checkpoint::save(self, path)
    }

    /// Rebuild a network from a checkpoint file.
    ///
    /// Loaded layers start with empty caches; a forward pass is required
    /// before any backward.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        checkpoint::load(path)
    }
}

/// Errors from the training loop itself. Per-batch layer failures are
/// reported and skipped instead of surfacing here.
#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error("batch size must be greater than zero")]
    EmptyBatch,
}
