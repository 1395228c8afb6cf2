//! Loss functions over prediction/target tensor pairs.
//!
//! Each loss comes as a pair of free functions: the scalar loss itself and
//! its gradient with respect to the predictions. Both are stateless; the
//! training loop calls them between the forward and backward passes.
//!
//! # Available Loss Functions
//!
//! - **Cross-Entropy**: `cross_entropy`, `cross_entropy_grad`
//! - **MSE (Mean Squared Error)**: `mse`, `mse_grad`

use crate::tensor::{Tensor, TensorError};

/// Clipping bound for cross-entropy probabilities.
const EPSILON: f32 = 1e-7;

fn check_pair(
    predictions: &Tensor,
    targets: &Tensor,
    op: &'static str,
) -> Result<(), TensorError> {
    if predictions.ndim() != 2 {
        return Err(TensorError::Rank {
            op,
            expected: 2,
            actual: predictions.ndim(),
        });
    }
    if predictions.shape() != targets.shape() {
        return Err(TensorError::ShapeMismatch {
            op,
            lhs: predictions.shape().to_vec(),
            rhs: targets.shape().to_vec(),
        });
    }
    Ok(())
}

// ============================================================================
// Cross-Entropy Loss
// ============================================================================

/// Cross-entropy loss for one-hot classification targets.
///
/// Both tensors must share shape `[batch, classes]`. Predictions are clipped
/// to `[1e-7, 1 - 1e-7]` before the log, so a confidently wrong probability
/// of exactly 0 or 1 cannot produce an infinite loss. Returns the mean over
/// the batch of `Σ_class target * -ln(clipped_prediction)`.
pub fn cross_entropy(predictions: &Tensor, targets: &Tensor) -> Result<f32, TensorError> {
    check_pair(predictions, targets, "cross_entropy")?;

    let mut loss = 0.0f32;
    for (&p, &t) in predictions.data().iter().zip(targets.data().iter()) {
        let clipped = p.clamp(EPSILON, 1.0 - EPSILON);
        loss += -clipped.ln() * t;
    }
    let batch = predictions.shape()[0];
    Ok(loss / batch as f32)
}

/// Gradient of cross-entropy loss through a final Softmax layer.
///
/// Returns `predictions - targets`, the combined softmax + cross-entropy
/// Jacobian. This shortcut is only the true gradient when the network's
/// final layer is Softmax; pairing it with any other final activation gives
/// a mathematically wrong gradient.
pub fn cross_entropy_grad(predictions: &Tensor, targets: &Tensor) -> Result<Tensor, TensorError> {
    check_pair(predictions, targets, "cross_entropy_grad")?;
    predictions.subtract(targets)
}

// ============================================================================
// MSE Loss (Mean Squared Error)
// ============================================================================

/// Mean squared error over all elements: `mean((predictions - targets)^2)`.
pub fn mse(predictions: &Tensor, targets: &Tensor) -> Result<f32, TensorError> {
    check_pair(predictions, targets, "mse")?;

    let mut sum = 0.0f32;
    for (&p, &t) in predictions.data().iter().zip(targets.data().iter()) {
        let diff = p - t;
        sum += diff * diff;
    }
    Ok(sum / predictions.size() as f32)
}

/// Gradient of MSE with respect to the predictions:
/// `(predictions - targets) / batch_size`.
pub fn mse_grad(predictions: &Tensor, targets: &Tensor) -> Result<Tensor, TensorError> {
    check_pair(predictions, targets, "mse_grad")?;
    let batch = predictions.shape()[0] as f32;
    let diff = predictions.subtract(targets)?;
    Ok(diff.apply(|v| v / batch))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(pred: Vec<f32>, target: Vec<f32>, shape: &[usize]) -> (Tensor, Tensor) {
        (
            Tensor::from_vec(pred, shape).unwrap(),
            Tensor::from_vec(target, shape).unwrap(),
        )
    }

    #[test]
    fn cross_entropy_of_confident_correct_prediction_is_small() {
        let (p, t) = pair(
            vec![0.999, 0.001, 0.001, 0.999],
            vec![1.0, 0.0, 0.0, 1.0],
            &[2, 2],
        );
        let loss = cross_entropy(&p, &t).unwrap();
        assert!(loss < 0.01, "loss {loss} not near zero");
    }

    #[test]
    fn cross_entropy_clips_zero_probability() {
        // A target class predicted with probability 0 must not blow up to inf.
        let (p, t) = pair(vec![0.0, 1.0], vec![1.0, 0.0], &[1, 2]);
        let loss = cross_entropy(&p, &t).unwrap();
        assert!(loss.is_finite());
        let expected = -(EPSILON.ln());
        assert!((loss - expected).abs() < 1e-3);
    }

    #[test]
    fn cross_entropy_known_value() {
        let (p, t) = pair(vec![0.5, 0.5], vec![1.0, 0.0], &[1, 2]);
        let loss = cross_entropy(&p, &t).unwrap();
        assert!((loss - 0.5f32.ln().abs()).abs() < 1e-6);
    }

    #[test]
    fn cross_entropy_rejects_shape_mismatch() {
        let p = Tensor::new(&[2, 3]).unwrap();
        let t = Tensor::new(&[2, 2]).unwrap();
        assert!(cross_entropy(&p, &t).is_err());
        assert!(cross_entropy_grad(&p, &t).is_err());
    }

    #[test]
    fn cross_entropy_grad_is_difference() {
        let (p, t) = pair(vec![0.7, 0.3, 0.2, 0.8], vec![1.0, 0.0, 0.0, 1.0], &[2, 2]);
        let g = cross_entropy_grad(&p, &t).unwrap();
        let expected = [0.7f32 - 1.0, 0.3, 0.2, 0.8 - 1.0];
        for (a, b) in g.data().iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn mse_known_value() {
        let (p, t) = pair(vec![1.0, 2.0, 3.0, 4.0], vec![1.0, 2.0, 5.0, 8.0], &[2, 2]);
        // squared diffs: 0, 0, 4, 16 -> mean 5
        assert!((mse(&p, &t).unwrap() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn mse_grad_divides_by_batch() {
        let (p, t) = pair(vec![2.0, 4.0, 6.0, 8.0], vec![0.0, 0.0, 0.0, 0.0], &[2, 2]);
        let g = mse_grad(&p, &t).unwrap();
        assert_eq!(g.data(), &[1.0, 2.0, 3.0, 4.0]);
    }
}
