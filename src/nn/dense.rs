//! Fully connected (dense) layer with hand-derived gradients.

use rand::rngs::StdRng;

use crate::nn::LayerError;
use crate::tensor::{Tensor, TensorError};

/// A fully connected layer computing `output = input @ W + b`.
///
/// Owns its weights (`[input_size, output_size]`), biases
/// (`[output_size]`), and a cache of the most recent forward input. The
/// cache is a single-owner slot: every forward call overwrites it, dropping
/// the previous snapshot, and `backward` is only valid once it is populated.
pub struct Dense {
    pub weights: Tensor,
    pub biases: Tensor,
    input_cache: Option<Tensor>,
    input_size: usize,
    output_size: usize,
}

impl Dense {
    /// Create a layer with weights drawn uniformly from `[-0.1, 0.1)` out of
    /// the caller's generator and zero biases.
    pub fn new(
        input_size: usize,
        output_size: usize,
        rng: &mut StdRng,
    ) -> Result<Self, TensorError> {
        let mut weights = Tensor::new(&[input_size, output_size])?;
        weights.random_init(-0.1, 0.1, rng);
        let biases = Tensor::new(&[output_size])?;
        Ok(Self {
            weights,
            biases,
            input_cache: None,
            input_size,
            output_size,
        })
    }

    /// Rebuild a layer from existing parameters, e.g. out of a checkpoint.
    ///
    /// Validates that `weights` is `[in, out]` and `biases` is `[out]`.
    pub fn from_parameters(weights: Tensor, biases: Tensor) -> Result<Self, TensorError> {
        if weights.ndim() != 2 {
            return Err(TensorError::Rank {
                op: "dense",
                expected: 2,
                actual: weights.ndim(),
            });
        }
        let (input_size, output_size) = (weights.shape()[0], weights.shape()[1]);
        if biases.shape() != [output_size] {
            return Err(TensorError::ShapeMismatch {
                op: "dense",
                lhs: weights.shape().to_vec(),
                rhs: biases.shape().to_vec(),
            });
        }
        Ok(Self {
            weights,
            biases,
            input_cache: None,
            input_size,
            output_size,
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Forward pass: `output = input @ W + broadcast(b)`.
    ///
    /// `input` must be `[batch, input_size]`. A deep copy of the input is
    /// cached for the backward pass, replacing any previous cache.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        if input.ndim() != 2 || input.shape()[1] != self.input_size {
            return Err(TensorError::ShapeMismatch {
                op: "dense_forward",
                lhs: input.shape().to_vec(),
                rhs: vec![input.shape()[0], self.input_size],
            }
            .into());
        }
        let affine = input.matmul(&self.weights)?;
        let bias_rows = self.biases.broadcast(affine.shape())?;
        let output = affine.add(&bias_rows)?;
        self.input_cache = Some(input.clone());
        Ok(output)
    }

    /// Backward pass with an in-place SGD step.
    ///
    /// Requires a prior forward call; `grad_output` must be
    /// `[batch, output_size]`. Computes
    ///
    /// - `grad_weights = input_cacheᵀ @ grad_output`
    /// - `grad_biases  = Σ_batch grad_output` (biases are shared across the
    ///   batch, so their gradient sums over the batch axis)
    /// - `grad_input   = grad_output @ Wᵀ`
    ///
    /// `grad_input` is computed from the weights as they were *before* the
    /// update in this same call; updating first would backpropagate through
    /// parameters the forward pass never saw.
    pub fn backward(
        &mut self,
        grad_output: &Tensor,
        learning_rate: f32,
    ) -> Result<Tensor, LayerError> {
        let input = self
            .input_cache
            .as_ref()
            .ok_or(LayerError::MissingCache { layer: "dense" })?;

        if grad_output.ndim() != 2
            || grad_output.shape()[0] != input.shape()[0]
            || grad_output.shape()[1] != self.output_size
        {
            return Err(TensorError::ShapeMismatch {
                op: "dense_backward",
                lhs: grad_output.shape().to_vec(),
                rhs: vec![input.shape()[0], self.output_size],
            }
            .into());
        }

        let grad_weights = input.transpose()?.matmul(grad_output)?;

        let batch = grad_output.shape()[0];
        let mut grad_biases = Tensor::new(&[self.output_size])?;
        for i in 0..batch {
            for j in 0..self.output_size {
                let g = grad_biases.get(&[j]) + grad_output.get(&[i, j]);
                grad_biases.set(&[j], g);
            }
        }

        // Pre-update weights: grad_input must see the parameters the
        // forward pass used.
        let grad_input = grad_output.matmul(&self.weights.transpose()?)?;

        for (w, g) in self.weights.data_mut().iter_mut().zip(grad_weights.data()) {
            *w -= learning_rate * g;
        }
        for (b, g) in self.biases.data_mut().iter_mut().zip(grad_biases.data()) {
            *b -= learning_rate * g;
        }

        Ok(grad_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn seeded() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    fn fixed_layer() -> Dense {
        // W = [[1, 2], [3, 4]], b = [0.5, -0.5]
        let weights = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        let biases = Tensor::from_vec(vec![0.5, -0.5], &[2]).unwrap();
        Dense::from_parameters(weights, biases).unwrap()
    }

    #[test]
    fn new_initializes_weights_and_zero_biases() {
        let mut rng = seeded();
        let layer = Dense::new(3, 4, &mut rng).unwrap();
        assert_eq!(layer.weights.shape(), &[3, 4]);
        assert_eq!(layer.biases.shape(), &[4]);
        assert!(layer.weights.data().iter().all(|&w| (-0.1..0.1).contains(&w)));
        assert!(layer.biases.data().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn forward_computes_affine_transform() {
        let mut layer = fixed_layer();
        let input = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0], &[2, 2]).unwrap();
        let out = layer.forward(&input).unwrap();
        // row0: [1, 2] + b, row1: [3, 4] + b
        assert_eq!(out.shape(), &[2, 2]);
        assert_eq!(out.data(), &[1.5, 1.5, 3.5, 3.5]);
    }

    #[test]
    fn forward_rejects_wrong_width() {
        let mut layer = fixed_layer();
        let input = Tensor::new(&[2, 3]).unwrap();
        assert!(layer.forward(&input).is_err());
    }

    #[test]
    fn backward_before_forward_is_a_state_error() {
        let mut layer = fixed_layer();
        let grad = Tensor::new(&[2, 2]).unwrap();
        assert_eq!(
            layer.backward(&grad, 0.1),
            Err(LayerError::MissingCache { layer: "dense" })
        );
    }

    #[test]
    fn backward_gradient_values() {
        let mut layer = fixed_layer();
        let input = Tensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap();
        layer.forward(&input).unwrap();

        let grad = Tensor::from_vec(vec![1.0, -1.0], &[1, 2]).unwrap();
        let grad_input = layer.backward(&grad, 0.0).unwrap();

        // grad_input = grad @ Wᵀ = [1*1 + -1*2, 1*3 + -1*4] = [-1, -1]
        assert_eq!(grad_input.data(), &[-1.0, -1.0]);
        // lr 0 leaves parameters untouched
        assert_eq!(layer.weights.data(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(layer.biases.data(), &[0.5, -0.5]);
    }

    #[test]
    fn backward_applies_sgd_update() {
        let mut layer = fixed_layer();
        let input = Tensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap();
        layer.forward(&input).unwrap();

        let grad = Tensor::from_vec(vec![1.0, -1.0], &[1, 2]).unwrap();
        layer.backward(&grad, 0.5).unwrap();

        // grad_w = inputᵀ @ grad = [[1], [2]] @ [[1, -1]] = [[1, -1], [2, -2]]
        // W -= 0.5 * grad_w
        assert_eq!(layer.weights.data(), &[0.5, 2.5, 2.0, 5.0]);
        // grad_b = [1, -1]; b -= 0.5 * grad_b
        assert_eq!(layer.biases.data(), &[0.0, 0.0]);
    }

    #[test]
    fn grad_input_uses_pre_update_weights() {
        let mut layer = fixed_layer();
        let input = Tensor::from_vec(vec![1.0, 2.0], &[1, 2]).unwrap();
        layer.forward(&input).unwrap();

        let grad = Tensor::from_vec(vec![1.0, -1.0], &[1, 2]).unwrap();
        // With a large learning rate the updated weights differ wildly from
        // the cached ones; grad_input must match the pre-update values.
        let grad_input = layer.backward(&grad, 10.0).unwrap();
        assert_eq!(grad_input.data(), &[-1.0, -1.0]);
    }

    #[test]
    fn backward_sums_bias_gradient_over_batch() {
        let mut layer = fixed_layer();
        let input = Tensor::from_vec(vec![0.0, 0.0, 0.0, 0.0], &[2, 2]).unwrap();
        layer.forward(&input).unwrap();

        let grad = Tensor::from_vec(vec![1.0, 2.0, 3.0, 4.0], &[2, 2]).unwrap();
        layer.backward(&grad, 1.0).unwrap();
        // grad_b = [1 + 3, 2 + 4] = [4, 6]; b -= grad_b
        assert_eq!(layer.biases.data(), &[0.5 - 4.0, -0.5 - 6.0]);
    }

    #[test]
    fn forward_replaces_previous_cache() {
        let mut layer = fixed_layer();
        let first = Tensor::from_vec(vec![1.0, 0.0], &[1, 2]).unwrap();
        let second = Tensor::from_vec(vec![0.0, 1.0], &[1, 2]).unwrap();
        layer.forward(&first).unwrap();
        layer.forward(&second).unwrap();

        let grad = Tensor::from_vec(vec![1.0, 0.0], &[1, 2]).unwrap();
        layer.backward(&grad, 1.0).unwrap();
        // grad_w = secondᵀ @ grad = [[0, 0], [1, 0]]
        assert_eq!(layer.weights.data(), &[1.0, 2.0, 2.0, 4.0]);
    }
}
