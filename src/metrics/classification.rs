//! Metrics for classification tasks.

use crate::tensor::Tensor;

/// Running accuracy over batches of one-hot predictions and targets.
///
/// Accuracy = correct / total
#[derive(Debug, Clone, Default)]
pub struct Accuracy {
    correct: usize,
    total: usize,
}

impl Accuracy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count the rows of `predictions` whose argmax matches the argmax of
    /// the one-hot `targets`. Both tensors must be `[batch, classes]`.
    pub fn update(&mut self, predictions: &Tensor, targets: &Tensor) {
        debug_assert_eq!(predictions.shape(), targets.shape());
        let batch_size = predictions.shape()[0];
        let classes = predictions.shape()[1];

        for i in 0..batch_size {
            let pred_class = argmax_row(predictions, i, classes);
            let target_class = argmax_row(targets, i, classes);
            if pred_class == target_class {
                self.correct += 1;
            }
            self.total += 1;
        }
    }

    pub fn compute(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

fn argmax_row(tensor: &Tensor, row: usize, classes: usize) -> usize {
    (0..classes)
        .max_by(|&a, &b| {
            tensor
                .get(&[row, a])
                .partial_cmp(&tensor.get(&[row, b]))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_argmax_matches() {
        let mut accuracy = Accuracy::new();
        let predictions =
            Tensor::from_vec(vec![0.9, 0.1, 0.3, 0.7, 0.6, 0.4], &[3, 2]).unwrap();
        let targets = Tensor::from_vec(vec![1.0, 0.0, 0.0, 1.0, 0.0, 1.0], &[3, 2]).unwrap();

        accuracy.update(&predictions, &targets);
        assert!((accuracy.compute() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn accumulates_across_updates_and_resets() {
        let mut accuracy = Accuracy::new();
        let hit = Tensor::from_vec(vec![0.8, 0.2], &[1, 2]).unwrap();
        let target = Tensor::from_vec(vec![1.0, 0.0], &[1, 2]).unwrap();
        let miss = Tensor::from_vec(vec![0.2, 0.8], &[1, 2]).unwrap();

        accuracy.update(&hit, &target);
        accuracy.update(&miss, &target);
        assert!((accuracy.compute() - 0.5).abs() < 1e-9);

        accuracy.reset();
        assert_eq!(accuracy.compute(), 0.0);
    }

    #[test]
    fn empty_metric_reports_zero() {
        let accuracy = Accuracy::new();
        assert_eq!(accuracy.compute(), 0.0);
    }
}
