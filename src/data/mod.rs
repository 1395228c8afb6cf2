//! # Data Loading Module
//!
//! Reading datasets from disk into [`Tensor`](crate::tensor::Tensor) form.
//!
//! ## Example
//!
//! ```ignore
//! use axiom::data::mnist;
//!
//! let data = mnist::load("data/mnist")?;
//! // data.x_train: [60000, 784] pixels in [0, 1]
//! // data.y_train: [60000, 10] one-hot labels
//! ```

pub mod mnist;

pub use mnist::{MnistData, MnistError};
