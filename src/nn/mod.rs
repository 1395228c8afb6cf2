//! # Neural Network Layers Module
//!
//! Building blocks for constructing feed-forward networks.
//!
//! Each layer implements the same two-operation contract:
//!
//! - `forward(input)` computes the layer output and caches whatever state
//!   the gradient computation will need;
//! - `backward(grad_output, ..)` consumes the cached state and returns the
//!   gradient with respect to the layer's input, updating trainable
//!   parameters in place where the layer has any.
//!
//! ## Available Layers
//!
//! - [`Dense`]: fully connected affine transform with trainable
//!   weights/biases
//! - [`Activation`]: stateless transform tagged [`ActivationKind::ReLU`] or
//!   [`ActivationKind::Softmax`]

pub mod activations;
pub mod dense;

pub use activations::{Activation, ActivationKind};
pub use dense::Dense;

use crate::tensor::TensorError;
use thiserror::Error;

/// Errors surfaced by layer forward/backward passes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LayerError {
    /// A tensor operation inside the layer failed (shape or rank mismatch).
    #[error(transparent)]
    Tensor(#[from] TensorError),

    /// `backward` was called before any `forward` populated the cache the
    /// gradient computation depends on.
    #[error("{layer}: backward called before forward populated the cache")]
    MissingCache { layer: &'static str },
}
