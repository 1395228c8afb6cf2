//! Command line entry point: train, evaluate, and run inference on MNIST.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use axiom::data::mnist;
use axiom::metrics::Accuracy;
use axiom::network::{Layer, Network};
use axiom::tensor::Tensor;

const INPUT_SIZE: usize = 784;
const HIDDEN_SIZE: usize = 128;
const NUM_CLASSES: usize = 10;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "axiom: a minimal feed-forward neural network toolkit", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a classifier on MNIST and save a checkpoint
    Train {
        /// Directory containing the four MNIST IDX files
        #[arg(long, default_value = "data/mnist")]
        data_dir: PathBuf,

        #[arg(long, default_value_t = 10)]
        epochs: usize,

        #[arg(long, default_value_t = 0.01)]
        learning_rate: f32,

        #[arg(long, default_value_t = 32)]
        batch_size: usize,

        /// Seed for weight initialization
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Where to write the trained model
        #[arg(long, default_value = "model.axio")]
        output: PathBuf,
    },

    /// Evaluate a saved model on the MNIST test split
    Evaluate {
        #[arg(long, default_value = "data/mnist")]
        data_dir: PathBuf,

        #[arg(long, default_value = "model.axio")]
        model: PathBuf,
    },

    /// Classify a single test image with a saved model
    Predict {
        #[arg(long, default_value = "data/mnist")]
        data_dir: PathBuf,

        #[arg(long, default_value = "model.axio")]
        model: PathBuf,

        /// Index into the test split
        #[arg(long, default_value_t = 0)]
        index: usize,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    match args.command {
        Command::Train {
            data_dir,
            epochs,
            learning_rate,
            batch_size,
            seed,
            output,
        } => train(data_dir, epochs, learning_rate, batch_size, seed, output),
        Command::Evaluate { data_dir, model } => evaluate(data_dir, model),
        Command::Predict {
            data_dir,
            model,
            index,
        } => predict(data_dir, model, index),
    }
}

fn train(
    data_dir: PathBuf,
    epochs: usize,
    learning_rate: f32,
    batch_size: usize,
    seed: u64,
    output: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("[1] Loading MNIST from {}...", data_dir.display());
    let data = mnist::load(&data_dir)?;
    println!(
        "    {} training samples, {} test samples",
        data.x_train.shape()[0],
        data.x_test.shape()[0]
    );

    let mut rng = StdRng::seed_from_u64(seed);
    let mut network = Network::new();
    network.add(Layer::dense(INPUT_SIZE, HIDDEN_SIZE, &mut rng)?);
    network.add(Layer::relu());
    network.add(Layer::dense(HIDDEN_SIZE, NUM_CLASSES, &mut rng)?);
    network.add(Layer::softmax());
    println!(
        "[2] Network built: {} -> {} (ReLU) -> {} (Softmax)",
        INPUT_SIZE, HIDDEN_SIZE, NUM_CLASSES
    );

    println!(
        "[3] Training for {} epochs (lr = {}, batch size = {})...",
        epochs, learning_rate, batch_size
    );
    let start = Instant::now();
    network.train(&data.x_train, &data.y_train, epochs, learning_rate, batch_size)?;
    println!("    Training finished in {:.2?}", start.elapsed());

    println!("[4] Evaluating on the test split...");
    report_accuracy(&mut network, &data.x_test, &data.y_test, batch_size)?;

    network.save(&output)?;
    println!("[5] Model saved to {}", output.display());
    Ok(())
}

fn evaluate(data_dir: PathBuf, model: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let data = mnist::load(&data_dir)?;
    let mut network = Network::load(&model)?;
    println!("Loaded model from {}", model.display());
    report_accuracy(&mut network, &data.x_test, &data.y_test, 256)?;
    Ok(())
}

fn predict(
    data_dir: PathBuf,
    model: PathBuf,
    index: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = mnist::load(&data_dir)?;
    let samples = data.x_test.shape()[0];
    if index >= samples {
        return Err(format!("index {} out of range, test split has {} samples", index, samples).into());
    }

    let mut network = Network::load(&model)?;
    let x = data.x_test.slice_rows(index, index + 1)?;
    let probabilities = network.predict(&x)?;

    let predicted = probabilities.argmax_rows()?[0];
    let actual = data.y_test.slice_rows(index, index + 1)?.argmax_rows()?[0];
    println!("Test image #{}", index);
    for class in 0..probabilities.shape()[1] {
        println!("  p({}) = {:.4}", class, probabilities.get(&[0, class]));
    }
    println!("Predicted: {}", predicted);
    println!("Actual:    {}", actual);
    Ok(())
}

/// Batched evaluation so the full test split never sits in one matmul.
fn report_accuracy(
    network: &mut Network,
    x: &Tensor,
    y: &Tensor,
    batch_size: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut accuracy = Accuracy::new();
    let samples = x.shape()[0];
    let mut start = 0;
    while start < samples {
        let end = (start + batch_size).min(samples);
        let predictions = network.predict(&x.slice_rows(start, end)?)?;
        accuracy.update(&predictions, &y.slice_rows(start, end)?);
        start = end;
    }
    println!("Accuracy: {:.4} ({} samples)", accuracy.compute(), samples);
    Ok(())
}
