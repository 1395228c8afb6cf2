//! Binary checkpoint format for saving and restoring networks.
//!
//! Layout (all integers little-endian):
//!
//! ```text
//! b"AXIO"                          magic tag
//! u32   layer_count
//! per layer:
//!   u8  layer kind (0 = dense, 1 = activation)
//!   dense:      u32 input_size, u32 output_size,
//!               input_size*output_size f32 weights (row-major),
//!               output_size f32 biases
//!   activation: u8 activation kind (0 = ReLU, 1 = Softmax)
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::network::{Layer, Network};
use crate::nn::{Activation, ActivationKind, Dense};
use crate::tensor::{Tensor, TensorError};

const MAGIC: [u8; 4] = *b"AXIO";

const KIND_DENSE: u8 = 0;
const KIND_ACTIVATION: u8 = 1;

const ACT_RELU: u8 = 0;
const ACT_SOFTMAX: u8 = 1;

/// Errors while reading or writing a checkpoint file.
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad magic tag {0:?}, not a checkpoint file")]
    BadMagic([u8; 4]),

    #[error("unknown layer kind byte {0}")]
    UnknownLayerKind(u8),

    #[error("unknown activation kind byte {0}")]
    UnknownActivationKind(u8),

    #[error(transparent)]
    Tensor(#[from] TensorError),
}

type Result<T> = std::result::Result<T, CheckpointError>;

/// Write all layer parameters of `network` to `path`, overwriting any
/// existing file.
pub fn save<P: AsRef<Path>>(network: &Network, path: P) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writer.write_all(&MAGIC)?;
    writer.write_all(&(network.layers().len() as u32).to_le_bytes())?;

    for layer in network.layers() {
        match layer {
            Layer::Dense(dense) => {
                writer.write_all(&[KIND_DENSE])?;
                writer.write_all(&(dense.input_size() as u32).to_le_bytes())?;
                writer.write_all(&(dense.output_size() as u32).to_le_bytes())?;
                write_f32_slice(&mut writer, dense.weights.data())?;
                write_f32_slice(&mut writer, dense.biases.data())?;
            }
            Layer::Activation(act) => {
                writer.write_all(&[KIND_ACTIVATION])?;
                let kind_byte = match act.kind() {
                    ActivationKind::ReLU => ACT_RELU,
                    ActivationKind::Softmax => ACT_SOFTMAX,
                };
                writer.write_all(&[kind_byte])?;
            }
        }
    }

    writer.flush()?;
    Ok(())
}

/// Rebuild a network from a checkpoint written by [`save`].
///
/// On any error the partially built network is dropped and nothing
/// leaks; a short or corrupted file never yields a half-loaded model.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Network> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(CheckpointError::BadMagic(magic));
    }

    let layer_count = read_u32(&mut reader)? as usize;
    let mut network = Network::new();

    for _ in 0..layer_count {
        let kind = read_u8(&mut reader)?;
        match kind {
            KIND_DENSE => {
                let input_size = read_u32(&mut reader)? as usize;
                let output_size = read_u32(&mut reader)? as usize;
                let weights = read_f32_vec(&mut reader, input_size as u64 * output_size as u64)?;
                let biases = read_f32_vec(&mut reader, output_size as u64)?;

                let weights = Tensor::from_vec(weights, &[input_size, output_size])?;
                let biases = Tensor::from_vec(biases, &[output_size])?;
                network.add(Layer::Dense(Dense::from_parameters(weights, biases)?));
            }
            KIND_ACTIVATION => {
                let act_kind = read_u8(&mut reader)?;
                let layer = match act_kind {
                    ACT_RELU => Layer::Activation(Activation::relu()),
                    ACT_SOFTMAX => Layer::Activation(Activation::softmax()),
                    other => return Err(CheckpointError::UnknownActivationKind(other)),
                };
                network.add(layer);
            }
            other => return Err(CheckpointError::UnknownLayerKind(other)),
        }
    }

    Ok(network)
}

fn write_f32_slice<W: Write>(writer: &mut W, values: &[f32]) -> Result<()> {
    for &v in values {
        writer.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_u8<R: Read>(reader: &mut R) -> Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

// `count` comes straight from file bytes, so the vector is grown only as
// data actually arrives; a corrupt header can never size the allocation,
// and a short file fails the read before memory becomes a problem.
fn read_f32_vec<R: Read>(reader: &mut R, count: u64) -> Result<Vec<f32>> {
    let mut values = Vec::new();
    let mut buf = [0u8; 4];
    for _ in 0..count {
        reader.read_exact(&mut buf)?;
        values.push(f32::from_le_bytes(buf));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    fn sample_network() -> Network {
        let mut rng = StdRng::seed_from_u64(11);
        let mut net = Network::new();
        net.add(Layer::dense(3, 4, &mut rng).unwrap());
        net.add(Layer::relu());
        net.add(Layer::dense(4, 2, &mut rng).unwrap());
        net.add(Layer::softmax());
        net
    }

    #[test]
    fn round_trip_preserves_forward_output() {
        let path = temp_path("axiom_roundtrip.axio");
        let mut original = sample_network();
        save(&original, &path).unwrap();

        let mut restored = load(&path).unwrap();
        fs::remove_file(&path).ok();

        let x = Tensor::from_vec(vec![0.1, -0.2, 0.3, 0.4, 0.5, -0.6], &[2, 3]).unwrap();
        let expected = original.forward(&x).unwrap();
        let actual = restored.forward(&x).unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn round_trip_preserves_layer_parameters() {
        let path = temp_path("axiom_params.axio");
        let original = sample_network();
        save(&original, &path).unwrap();

        let restored = load(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(restored.layers().len(), original.layers().len());
        for (a, b) in original.layers().iter().zip(restored.layers()) {
            match (a, b) {
                (Layer::Dense(da), Layer::Dense(db)) => {
                    assert_eq!(da.weights, db.weights);
                    assert_eq!(da.biases, db.biases);
                }
                (Layer::Activation(aa), Layer::Activation(ab)) => {
                    assert_eq!(aa.kind(), ab.kind());
                }
                _ => panic!("layer kinds diverged after reload"),
            }
        }
    }

    #[test]
    fn rejects_bad_magic() {
        let path = temp_path("axiom_badmagic.axio");
        fs::write(&path, b"NOPE\x00\x00\x00\x00").unwrap();
        let result = load(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(CheckpointError::BadMagic(_))));
    }

    #[test]
    fn rejects_truncated_file() {
        let path = temp_path("axiom_truncated.axio");
        // Magic plus a count of 2 layers, then nothing.
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"AXIO");
        bytes.extend_from_slice(&2u32.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let result = load(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(CheckpointError::Io(_))));
    }

    #[test]
    fn rejects_huge_dense_dimensions_without_allocating() {
        // A dense record claiming u32::MAX x u32::MAX weights is truncated
        // at the weights field; it must come back as an I/O error, never an
        // enormous allocation or a capacity panic.
        let path = temp_path("axiom_hugedims.axio");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"AXIO");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(0); // dense record
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        fs::write(&path, &bytes).unwrap();

        let result = load(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(CheckpointError::Io(_))));
    }

    #[test]
    fn rejects_unknown_layer_kind() {
        let path = temp_path("axiom_badkind.axio");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"AXIO");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(9);
        fs::write(&path, &bytes).unwrap();

        let result = load(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(CheckpointError::UnknownLayerKind(9))));
    }

    #[test]
    fn rejects_unknown_activation_kind() {
        let path = temp_path("axiom_badact.axio");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"AXIO");
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.push(1); // activation record
        bytes.push(7); // bogus activation kind
        fs::write(&path, &bytes).unwrap();

        let result = load(&path);
        fs::remove_file(&path).ok();
        assert!(matches!(result, Err(CheckpointError::UnknownActivationKind(7))));
    }
}
