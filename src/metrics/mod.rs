//! Metrics for evaluating trained models.
//!
//! # Example
//!
//! ```rust,ignore
//! use axiom::metrics::Accuracy;
//!
//! let mut accuracy = Accuracy::new();
//! accuracy.update(&predictions, &targets);
//! println!("Accuracy: {:.4}", accuracy.compute());
//! accuracy.reset();
//! ```

pub mod classification;

pub use classification::Accuracy;
