//! Loader for the MNIST handwritten digit dataset in IDX format.
//!
//! IDX files carry big-endian u32 headers: a magic number (0x0803 for
//! images, 0x0801 for labels) followed by dimension sizes, then raw bytes.
//! Images are flattened to `[n, 784]` rows scaled into `[0, 1]`; labels
//! become one-hot `[n, 10]` rows.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::tensor::{Tensor, TensorError};

const IMAGE_MAGIC: u32 = 0x0803;
const LABEL_MAGIC: u32 = 0x0801;

const IMAGE_ROWS: usize = 28;
const IMAGE_COLS: usize = 28;
const NUM_CLASSES: usize = 10;

/// Errors while reading IDX files.
#[derive(Error, Debug)]
pub enum MnistError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path}: bad magic number {actual:#06x}, expected {expected:#06x}")]
    BadMagic {
        path: PathBuf,
        expected: u32,
        actual: u32,
    },

    #[error("{path}: unexpected image dimensions {rows}x{cols}, expected 28x28")]
    BadDimensions {
        path: PathBuf,
        rows: usize,
        cols: usize,
    },

    #[error("{path}: file too short for the {declared} samples its header declares")]
    Truncated { path: PathBuf, declared: usize },

    #[error("{path}: label {label} out of range for {classes} classes")]
    BadLabel {
        path: PathBuf,
        label: u8,
        classes: usize,
    },

    #[error("image file has {images} samples but label file has {labels}")]
    CountMismatch { images: usize, labels: usize },

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

/// The four MNIST splits, ready for training and evaluation.
pub struct MnistData {
    pub x_train: Tensor,
    pub y_train: Tensor,
    pub x_test: Tensor,
    pub y_test: Tensor,
}

/// Load all four MNIST files from `dir` using their conventional names.
pub fn load<P: AsRef<Path>>(dir: P) -> Result<MnistData, MnistError> {
    let dir = dir.as_ref();
    let x_train = load_images(dir.join("train-images.idx3-ubyte"))?;
    let y_train = load_labels(dir.join("train-labels.idx1-ubyte"))?;
    let x_test = load_images(dir.join("t10k-images-idx3-ubyte"))?;
    let y_test = load_labels(dir.join("t10k-labels-idx1-ubyte"))?;

    check_counts(&x_train, &y_train)?;
    check_counts(&x_test, &y_test)?;

    Ok(MnistData {
        x_train,
        y_train,
        x_test,
        y_test,
    })
}

fn check_counts(images: &Tensor, labels: &Tensor) -> Result<(), MnistError> {
    if images.shape()[0] != labels.shape()[0] {
        return Err(MnistError::CountMismatch {
            images: images.shape()[0],
            labels: labels.shape()[0],
        });
    }
    Ok(())
}

/// Read an IDX image file into a `[n, 784]` tensor of pixels in `[0, 1]`.
pub fn load_images<P: AsRef<Path>>(path: P) -> Result<Tensor, MnistError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| MnistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file_len = file
        .metadata()
        .map_err(|source| MnistError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    let mut reader = BufReader::new(file);

    let magic = read_be_u32(&mut reader, path)?;
    if magic != IMAGE_MAGIC {
        return Err(MnistError::BadMagic {
            path: path.to_path_buf(),
            expected: IMAGE_MAGIC,
            actual: magic,
        });
    }

    let count = read_be_u32(&mut reader, path)? as usize;
    let rows = read_be_u32(&mut reader, path)? as usize;
    let cols = read_be_u32(&mut reader, path)? as usize;
    if rows != IMAGE_ROWS || cols != IMAGE_COLS {
        return Err(MnistError::BadDimensions {
            path: path.to_path_buf(),
            rows,
            cols,
        });
    }

    // The header count is untrusted file bytes; check it against the real
    // file length before it sizes an allocation.
    let pixel_bytes = count as u64 * (rows * cols) as u64;
    let header_bytes = 4 * std::mem::size_of::<u32>() as u64;
    if pixel_bytes > file_len.saturating_sub(header_bytes) {
        return Err(MnistError::Truncated {
            path: path.to_path_buf(),
            declared: count,
        });
    }

    let mut raw = vec![0u8; pixel_bytes as usize];
    reader
        .read_exact(&mut raw)
        .map_err(|source| MnistError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let pixels = raw.iter().map(|&b| b as f32 / 255.0).collect();
    Ok(Tensor::from_vec(pixels, &[count, rows * cols])?)
}

/// Read an IDX label file into a one-hot `[n, 10]` tensor.
pub fn load_labels<P: AsRef<Path>>(path: P) -> Result<Tensor, MnistError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| MnistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let file_len = file
        .metadata()
        .map_err(|source| MnistError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .len();
    let mut reader = BufReader::new(file);

    let magic = read_be_u32(&mut reader, path)?;
    if magic != LABEL_MAGIC {
        return Err(MnistError::BadMagic {
            path: path.to_path_buf(),
            expected: LABEL_MAGIC,
            actual: magic,
        });
    }

    let count = read_be_u32(&mut reader, path)? as usize;
    let header_bytes = 2 * std::mem::size_of::<u32>() as u64;
    if count as u64 > file_len.saturating_sub(header_bytes) {
        return Err(MnistError::Truncated {
            path: path.to_path_buf(),
            declared: count,
        });
    }
    let mut raw = vec![0u8; count];
    reader
        .read_exact(&mut raw)
        .map_err(|source| MnistError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    let mut one_hot = Tensor::new(&[count, NUM_CLASSES])?;
    for (i, &label) in raw.iter().enumerate() {
        if label as usize >= NUM_CLASSES {
            return Err(MnistError::BadLabel {
                path: path.to_path_buf(),
                label,
                classes: NUM_CLASSES,
            });
        }
        one_hot.set(&[i, label as usize], 1.0);
    }
    Ok(one_hot)
}

fn read_be_u32<R: Read>(reader: &mut R, path: &Path) -> Result<u32, MnistError> {
    let mut buf = [0u8; 4];
    reader
        .read_exact(&mut buf)
        .map_err(|source| MnistError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(u32::from_be_bytes(buf))
}
