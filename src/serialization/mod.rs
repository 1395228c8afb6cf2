//! Model serialization.
//!
//! Networks are persisted in a small binary checkpoint format:
//! a magic tag, a layer count, then one self-describing record per layer.
//!
//! # Examples
//!
//! ```rust,ignore
//! use axiom::Network;
//!
//! network.save("model.axio")?;
//! let restored = Network::load("model.axio")?;
//! ```

pub mod checkpoint;

pub use checkpoint::{load, save, CheckpointError};
