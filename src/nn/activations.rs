//! Activation layers: ReLU and Softmax.

use crate::nn::LayerError;
use crate::tensor::{Tensor, TensorError};

/// The closed set of activation functions the network dispatches over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationKind {
    ReLU,
    Softmax,
}

/// A stateless transform that caches its forward input and output so the
/// backward pass can compute its gradient.
///
/// Per instance the lifecycle is `Uninitialized -> forward called (caches
/// populated) -> backward valid`; calling backward first fails with
/// [`LayerError::MissingCache`]. Each forward call overwrites both cache
/// slots, dropping the previous tensors.
pub struct Activation {
    kind: ActivationKind,
    input_cache: Option<Tensor>,
    output_cache: Option<Tensor>,
}

impl Activation {
    pub fn relu() -> Self {
        Self {
            kind: ActivationKind::ReLU,
            input_cache: None,
            output_cache: None,
        }
    }

    pub fn softmax() -> Self {
        Self {
            kind: ActivationKind::Softmax,
            input_cache: None,
            output_cache: None,
        }
    }

    pub fn kind(&self) -> ActivationKind {
        self.kind
    }

    /// Apply the activation, caching input and output for backward.
    ///
    /// ReLU works element-wise on any rank; Softmax is 2-D only and
    /// normalizes along the class (last) axis.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor, LayerError> {
        let output = match self.kind {
            ActivationKind::ReLU => input.apply(|v| if v > 0.0 { v } else { 0.0 }),
            ActivationKind::Softmax => softmax_rows(input)?,
        };
        self.input_cache = Some(input.clone());
        self.output_cache = Some(output.clone());
        Ok(output)
    }

    /// Gradient of the activation with respect to its input.
    pub fn backward(&mut self, grad_output: &Tensor) -> Result<Tensor, LayerError> {
        match self.kind {
            ActivationKind::ReLU => {
                let input = self
                    .input_cache
                    .as_ref()
                    .ok_or(LayerError::MissingCache { layer: "relu" })?;
                if grad_output.shape() != input.shape() {
                    return Err(TensorError::ShapeMismatch {
                        op: "relu_backward",
                        lhs: grad_output.shape().to_vec(),
                        rhs: input.shape().to_vec(),
                    }
                    .into());
                }
                // Gradient passes exactly where the forward pass did; the
                // tie at 0 routes to the zero branch, same as forward.
                let mut grad_input = grad_output.clone();
                for (g, &x) in grad_input.data_mut().iter_mut().zip(input.data()) {
                    if x <= 0.0 {
                        *g = 0.0;
                    }
                }
                Ok(grad_input)
            }
            ActivationKind::Softmax => {
                let output = self
                    .output_cache
                    .as_ref()
                    .ok_or(LayerError::MissingCache { layer: "softmax" })?;
                if grad_output.shape() != output.shape() {
                    return Err(TensorError::ShapeMismatch {
                        op: "softmax_backward",
                        lhs: grad_output.shape().to_vec(),
                        rhs: output.shape().to_vec(),
                    }
                    .into());
                }

                // Row-wise Jacobian-vector product. Softmax outputs are
                // coupled through the row sum, so each grad_input[j] mixes
                // the whole row's grad via the dot term; the full Jacobian
                // never needs to be materialized.
                let batch = output.shape()[0];
                let classes = output.shape()[1];
                let mut grad_input = Tensor::new(grad_output.shape())?;
                for i in 0..batch {
                    let mut dot = 0.0f32;
                    for j in 0..classes {
                        dot += grad_output.get(&[i, j]) * output.get(&[i, j]);
                    }
                    for j in 0..classes {
                        let o = output.get(&[i, j]);
                        grad_input.set(&[i, j], o * (grad_output.get(&[i, j]) - dot));
                    }
                }
                Ok(grad_input)
            }
        }
    }
}

/// Numerically stable softmax along the last axis of a 2-D tensor.
///
/// Subtracting the row max before exponentiating keeps `exp` from
/// overflowing on large logits without changing the result.
fn softmax_rows(input: &Tensor) -> Result<Tensor, LayerError> {
    if input.ndim() != 2 {
        return Err(TensorError::Rank {
            op: "softmax",
            expected: 2,
            actual: input.ndim(),
        }
        .into());
    }
    let batch = input.shape()[0];
    let classes = input.shape()[1];
    let mut output = Tensor::new(input.shape())?;

    for i in 0..batch {
        let mut max_val = input.get(&[i, 0]);
        for j in 1..classes {
            max_val = max_val.max(input.get(&[i, j]));
        }

        let mut sum = 0.0f32;
        for j in 0..classes {
            let e = (input.get(&[i, j]) - max_val).exp();
            output.set(&[i, j], e);
            sum += e;
        }

        for j in 0..classes {
            output.set(&[i, j], output.get(&[i, j]) / sum);
        }
    }
    Ok(output)
}
