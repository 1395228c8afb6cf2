//! # Tensor Engine
//!
//! The strided N-dimensional array type everything else in the crate is
//! built on. A [`Tensor`] owns a flat `f32` buffer together with its shape
//! and canonical row-major strides; all indexing goes through the strides,
//! so higher layers never touch raw offsets themselves.
//!
//! Every binary operation validates shapes up front and reports failures as
//! [`TensorError`] instead of panicking. Ownership is always single and
//! exclusive: operations that produce a tensor hand full ownership to the
//! caller, and `Clone` performs a deep copy.

use rand::distributions::Uniform;
use rand::rngs::StdRng;
use rand::Rng;
use thiserror::Error;

/// Errors produced by tensor allocation and arithmetic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    /// The requested shape cannot back a buffer: it is empty, or its
    /// element count overflows `usize`.
    #[error("cannot allocate a tensor with shape {shape:?}")]
    Allocation { shape: Vec<usize> },

    /// A flat buffer was paired with a shape of a different element count.
    #[error("{len} elements do not fill shape {shape:?}")]
    SizeMismatch { len: usize, shape: Vec<usize> },

    /// Two operands disagree in rank or dimensions, the matmul inner
    /// dimensions differ, or a broadcast target is incompatible.
    #[error("{op}: shape mismatch between {lhs:?} and {rhs:?}")]
    ShapeMismatch {
        op: &'static str,
        lhs: Vec<usize>,
        rhs: Vec<usize>,
    },

    /// An operation restricted to a specific rank received something else.
    #[error("{op}: expected a {expected}-D tensor, got {actual} dimensions")]
    Rank {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A row range fell outside the tensor.
    #[error("row range {start}..{end} out of bounds for {rows} rows")]
    RowRange {
        start: usize,
        end: usize,
        rows: usize,
    },
}

/// An owning, contiguous, row-major N-dimensional array of `f32`.
///
/// Invariants, maintained by every constructor:
/// - `data.len() == shape.iter().product()`
/// - `shape.len() == strides.len()`
/// - strides are the canonical row-major strides for `shape`
///   (last dimension has stride 1).
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    data: Vec<f32>,
    shape: Vec<usize>,
    strides: Vec<usize>,
}

fn contiguous_strides(shape: &[usize]) -> Vec<usize> {
    let ndim = shape.len();
    let mut strides = vec![1usize; ndim];
    for d in (0..ndim.saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * shape[d + 1];
    }
    strides
}

fn checked_size(shape: &[usize]) -> Option<usize> {
    shape.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d))
}

impl Tensor {
    /// Create a zero-filled tensor of the given shape.
    ///
    /// Fails with [`TensorError::Allocation`] if the shape is empty or the
    /// element count overflows.
    pub fn new(shape: &[usize]) -> Result<Self, TensorError> {
        if shape.is_empty() {
            return Err(TensorError::Allocation {
                shape: shape.to_vec(),
            });
        }
        let size = checked_size(shape).ok_or_else(|| TensorError::Allocation {
            shape: shape.to_vec(),
        })?;
        Ok(Self {
            data: vec![0.0; size],
            shape: shape.to_vec(),
            strides: contiguous_strides(shape),
        })
    }

    /// Wrap an existing flat buffer in a shape.
    ///
    /// The buffer length must equal the product of the shape dimensions.
    pub fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self, TensorError> {
        if shape.is_empty() {
            return Err(TensorError::Allocation {
                shape: shape.to_vec(),
            });
        }
        let size = checked_size(shape).ok_or_else(|| TensorError::Allocation {
            shape: shape.to_vec(),
        })?;
        if data.len() != size {
            return Err(TensorError::SizeMismatch {
                len: data.len(),
                shape: shape.to_vec(),
            });
        }
        Ok(Self {
            data,
            shape: shape.to_vec(),
            strides: contiguous_strides(shape),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    fn flat_index(&self, idx: &[usize]) -> usize {
        debug_assert_eq!(idx.len(), self.ndim());
        idx.iter().zip(self.strides.iter()).map(|(i, s)| i * s).sum()
    }

    /// Element by multi-index. Panics on out-of-bounds indices, like slice
    /// indexing does.
    pub fn get(&self, idx: &[usize]) -> f32 {
        self.data[self.flat_index(idx)]
    }

    /// Set element by multi-index.
    pub fn set(&mut self, idx: &[usize], value: f32) {
        let fi = self.flat_index(idx);
        self.data[fi] = value;
    }

    /// Overwrite every element with `value`.
    pub fn fill(&mut self, value: f32) {
        for v in &mut self.data {
            *v = value;
        }
    }

    /// Element-wise transform into a new tensor of identical shape.
    pub fn apply(&self, f: impl Fn(f32) -> f32) -> Self {
        Self {
            data: self.data.iter().map(|&v| f(v)).collect(),
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        }
    }

    /// Element-wise transform in place.
    pub fn apply_in_place(&mut self, f: impl Fn(f32) -> f32) {
        for v in &mut self.data {
            *v = f(*v);
        }
    }

    /// Fill with uniform values in `[min, max)` drawn from the caller's
    /// generator.
    ///
    /// The generator is owned and seeded by the caller, so two tensors
    /// initialized from independently seeded generators never perturb each
    /// other's streams, and a fixed seed reproduces the same weights.
    pub fn random_init(&mut self, min: f32, max: f32, rng: &mut StdRng) {
        let dist = Uniform::new(min, max);
        for v in &mut self.data {
            *v = rng.sample(dist);
        }
    }

    fn check_same_shape(&self, other: &Self, op: &'static str) -> Result<(), TensorError> {
        if self.shape != other.shape {
            return Err(TensorError::ShapeMismatch {
                op,
                lhs: self.shape.clone(),
                rhs: other.shape.clone(),
            });
        }
        Ok(())
    }

    /// Element-wise sum. Both operands must have identical rank and shape.
    pub fn add(&self, other: &Self) -> Result<Self, TensorError> {
        self.check_same_shape(other, "add")?;
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| a + b)
            .collect();
        Ok(Self {
            data,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        })
    }

    /// Element-wise difference. Both operands must have identical rank and
    /// shape.
    pub fn subtract(&self, other: &Self) -> Result<Self, TensorError> {
        self.check_same_shape(other, "subtract")?;
        let data = self
            .data
            .iter()
            .zip(other.data.iter())
            .map(|(&a, &b)| a - b)
            .collect();
        Ok(Self {
            data,
            shape: self.shape.clone(),
            strides: self.strides.clone(),
        })
    }

    /// Matrix product of two 2-D tensors: `[m, n] @ [n, p] -> [m, p]`.
    ///
    /// The loop nest is i-k-j: the innermost loop walks a row of `b` and a
    /// row of the result, so both are read and written sequentially. The
    /// result buffer starts zeroed and is accumulated into.
    pub fn matmul(&self, other: &Self) -> Result<Self, TensorError> {
        if self.ndim() != 2 {
            return Err(TensorError::Rank {
                op: "matmul",
                expected: 2,
                actual: self.ndim(),
            });
        }
        if other.ndim() != 2 {
            return Err(TensorError::Rank {
                op: "matmul",
                expected: 2,
                actual: other.ndim(),
            });
        }
        let (m, n) = (self.shape[0], self.shape[1]);
        let p = other.shape[1];
        if other.shape[0] != n {
            return Err(TensorError::ShapeMismatch {
                op: "matmul",
                lhs: self.shape.clone(),
                rhs: other.shape.clone(),
            });
        }

        let mut result = Self::new(&[m, p])?;
        let rs0 = result.strides[0];
        for i in 0..m {
            for k in 0..n {
                let a_ik = self.data[i * self.strides[0] + k * self.strides[1]];
                let b_row = k * other.strides[0];
                let out_row = i * rs0;
                for j in 0..p {
                    result.data[out_row + j] += a_ik * other.data[b_row + j * other.strides[1]];
                }
            }
        }
        Ok(result)
    }

    /// Transpose of a 2-D tensor. The data is physically reordered, so the
    /// result carries canonical strides like every other tensor.
    pub fn transpose(&self) -> Result<Self, TensorError> {
        if self.ndim() != 2 {
            return Err(TensorError::Rank {
                op: "transpose",
                expected: 2,
                actual: self.ndim(),
            });
        }
        let (rows, cols) = (self.shape[0], self.shape[1]);
        let mut result = Self::new(&[cols, rows])?;
        for i in 0..rows {
            for j in 0..cols {
                result.data[j * result.strides[0] + i * result.strides[1]] =
                    self.data[i * self.strides[0] + j * self.strides[1]];
            }
        }
        Ok(result)
    }

    /// Broadcast into `new_shape` with NumPy trailing-dimension alignment.
    ///
    /// This tensor's shape is right-aligned against `new_shape`; each of its
    /// dimensions must equal the corresponding target dimension or be 1
    /// (which replicates along that axis). Dimensions the source does not
    /// possess replicate as well.
    pub fn broadcast(&self, new_shape: &[usize]) -> Result<Self, TensorError> {
        let src_ndim = self.ndim();
        let dst_ndim = new_shape.len();
        if dst_ndim < src_ndim {
            return Err(TensorError::ShapeMismatch {
                op: "broadcast",
                lhs: self.shape.clone(),
                rhs: new_shape.to_vec(),
            });
        }
        let offset = dst_ndim - src_ndim;
        for d in 0..src_ndim {
            let src = self.shape[d];
            let dst = new_shape[offset + d];
            if src != dst && src != 1 {
                return Err(TensorError::ShapeMismatch {
                    op: "broadcast",
                    lhs: self.shape.clone(),
                    rhs: new_shape.to_vec(),
                });
            }
        }

        let mut result = Self::new(new_shape)?;
        // Walk the output in flat order, carrying the matching source offset.
        // A source dimension of size 1, or one the source lacks entirely,
        // contributes nothing to the source index, which is what replicates it.
        let mut idx = vec![0usize; dst_ndim];
        for out in result.data.iter_mut() {
            let mut src_flat = 0usize;
            for d in 0..src_ndim {
                if self.shape[d] != 1 {
                    src_flat += idx[offset + d] * self.strides[d];
                }
            }
            *out = self.data[src_flat];

            for d in (0..dst_ndim).rev() {
                idx[d] += 1;
                if idx[d] < new_shape[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        Ok(result)
    }

    /// Contiguous slice of rows `start..end` of a 2-D tensor, copied into a
    /// new tensor. Used by the mini-batch loop to carve batches out of a
    /// dataset without touching the original.
    pub fn slice_rows(&self, start: usize, end: usize) -> Result<Self, TensorError> {
        if self.ndim() != 2 {
            return Err(TensorError::Rank {
                op: "slice_rows",
                expected: 2,
                actual: self.ndim(),
            });
        }
        let rows = self.shape[0];
        if start > end || end > rows {
            return Err(TensorError::RowRange { start, end, rows });
        }
        let cols = self.shape[1];
        let data = self.data[start * cols..end * cols].to_vec();
        Self::from_vec(data, &[end - start, cols])
    }

    /// Index of the largest element in each row of a 2-D tensor. Ties go to
    /// the earliest index.
    pub fn argmax_rows(&self) -> Result<Vec<usize>, TensorError> {
        if self.ndim() != 2 {
            return Err(TensorError::Rank {
                op: "argmax_rows",
                expected: 2,
                actual: self.ndim(),
            });
        }
        let (rows, cols) = (self.shape[0], self.shape[1]);
        let mut result = Vec::with_capacity(rows);
        for i in 0..rows {
            let mut best = 0usize;
            let mut best_val = self.get(&[i, 0]);
            for j in 1..cols {
                let v = self.get(&[i, j]);
                if v > best_val {
                    best = j;
                    best_val = v;
                }
            }
            result.push(best);
        }
        Ok(result)
    }
}
