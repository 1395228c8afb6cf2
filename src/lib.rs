//! # axiom: A Minimal Feed-Forward Neural Network Toolkit
//!
//! **axiom** trains fully connected classifiers with plain mini-batch SGD.
//! It is built on a small strided N-dimensional tensor engine, eager layers
//! that cache what their backward pass needs, and a sequential [`Network`]
//! container with its own binary checkpoint format.
//!
//! ## Usage Example
//!
//! ```no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use axiom::network::{Layer, Network};
//! use axiom::tensor::Tensor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // 1. Seeded weight initialization keeps runs reproducible
//! let mut rng = StdRng::seed_from_u64(42);
//!
//! // 2. Stack layers into a sequential network
//! let mut network = Network::new();
//! network.add(Layer::dense(784, 128, &mut rng)?);
//! network.add(Layer::relu());
//! network.add(Layer::dense(128, 10, &mut rng)?);
//! network.add(Layer::softmax());
//!
//! // 3. Train with cross-entropy loss and save the result
//! # let (x, y) = (Tensor::new(&[1, 784])?, Tensor::new(&[1, 10])?);
//! network.train(&x, &y, 10, 0.01, 32)?;
//! network.save("model.axio")?;
//! # Ok(())
//! # }
//! ```

// Declare public modules that constitute the core library API.
pub mod data;
pub mod losses;
pub mod metrics;
pub mod network;
pub mod nn;
pub mod serialization;
pub mod tensor;

pub use network::{Layer, Network};
pub use tensor::Tensor;
