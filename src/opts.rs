//! CLI options.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::dataset::Precision;
use crate::model::pmf::{Hyperparameters, MatrixInit};
use crate::model::ModelKind;
use crate::similarity::Similarity;

pub mod parsers;

#[derive(Parser)]
#[command(author, version, about)]
pub struct Opts {
    /// Random generator seed
    #[arg(long, default_value = "0", env = "MCFS_SEED")]
    pub seed: u64,

    #[command(subcommand)]
    pub subcommand: Subcommand,
}

#[derive(clap::Subcommand)]
pub enum Subcommand {
    Train(TrainOpts),
    Test(TestOpts),
    Partition(PartitionOpts),
    Info(InfoOpts),
    Binarize(BinarizeOpts),
    Generate(GenerateOpts),
}

/// Trains a model and saves it
#[derive(Args)]
pub struct TrainOpts {
    #[arg(short, long, value_enum)]
    pub model: ModelKind,

    /// Training set
    #[arg(long = "train")]
    pub train_path: PathBuf,

    /// Validation set
    #[arg(long = "valid")]
    pub valid_path: Option<PathBuf>,

    /// Output model file
    #[arg(short, long = "output")]
    pub output_path: PathBuf,

    /// Continue from the saved model, ignoring the hyperparameter options
    #[arg(long = "load")]
    pub load_path: Option<PathBuf>,

    /// Save the model as JSON
    #[arg(long)]
    pub text: bool,

    #[command(flatten)]
    pub neighbours: NeighboursOpts,

    #[command(flatten)]
    pub pmf: PmfOpts,
}

#[derive(Args)]
pub struct NeighboursOpts {
    /// Neighbourhood size, 0 means all the neighbours
    #[arg(short, default_value = "0")]
    pub k: u32,

    #[arg(long, value_enum, default_value = "cosine")]
    pub similarity: Similarity,
}

#[derive(Args, Clone, Copy)]
pub struct PmfOpts {
    /// Number of latent factors
    #[arg(long, default_value = "10", value_parser = parsers::non_zero_u32)]
    pub factors: u32,

    /// Number of minibatch iterations
    #[arg(long, default_value = "100")]
    pub max_iters: u32,

    #[arg(long, default_value = "100", value_parser = parsers::non_zero_u32)]
    pub batch_size: u32,

    #[arg(long, default_value = "0.1")]
    pub learning_rate: f32,

    #[arg(long, default_value = "0")]
    pub momentum: f32,

    /// User factors regularization
    #[arg(long, default_value = "0")]
    pub ly: f32,

    /// Item factors regularization
    #[arg(long, default_value = "0")]
    pub lv: f32,

    /// Implicit feedback factors regularization
    #[arg(long, default_value = "0")]
    pub lw: f32,

    #[arg(long, value_enum, default_value = "static")]
    pub matrix_init: MatrixInit,
}

impl From<PmfOpts> for Hyperparameters {
    fn from(opts: PmfOpts) -> Self {
        Self {
            factors: opts.factors,
            max_iters: opts.max_iters,
            batch_size: opts.batch_size,
            learning_rate: opts.learning_rate,
            momentum: opts.momentum,
            ly: opts.ly,
            lv: opts.lv,
            lw: opts.lw,
            matrix_init: opts.matrix_init,
        }
    }
}

/// Evaluates a saved model on the test set
#[derive(Args)]
pub struct TestOpts {
    #[arg(short, long, value_enum)]
    pub model: ModelKind,

    #[arg(long = "model-file")]
    pub model_path: PathBuf,

    /// Test set
    #[arg(long = "test")]
    pub test_path: PathBuf,
}

/// Splits the dataset into two random parts
#[derive(Args)]
pub struct PartitionOpts {
    #[arg(short, long = "input")]
    pub input_path: PathBuf,

    /// Output for the leading fraction of the ratings
    #[arg(long = "part1")]
    pub part_1_path: PathBuf,

    /// Output for the remaining ratings
    #[arg(long = "part2")]
    pub part_2_path: PathBuf,

    /// Fraction of the ratings in the first part
    #[arg(long, default_value = "0.8", value_parser = parsers::fraction)]
    pub fraction: f64,

    #[arg(long)]
    pub text: bool,
}

/// Prints the dataset or model summary
#[derive(Args)]
pub struct InfoOpts {
    #[arg(short, long = "input")]
    pub input_path: PathBuf,

    /// Number of random ratings to print
    #[arg(short, default_value = "10")]
    pub n: usize,

    /// Treat the input as a saved model of this kind
    #[arg(short, long, value_enum)]
    pub model: Option<ModelKind>,
}

/// Converts whitespace-separated `user item score…` lines into a dataset
#[derive(Args)]
pub struct BinarizeOpts {
    /// Text input, standard input by default
    #[arg(short, long = "input")]
    pub input_path: Option<PathBuf>,

    #[arg(short, long = "output")]
    pub output_path: PathBuf,

    /// Per-criterion minimum scores, scanned from the ratings by default
    #[arg(long, value_delimiter = ',')]
    pub minv: Vec<f32>,

    /// Per-criterion maximum scores, scanned from the ratings by default
    #[arg(long, value_delimiter = ',')]
    pub maxv: Vec<f32>,

    /// Per-criterion precision, a single value applies to all the criteria
    #[arg(long, value_enum, value_delimiter = ',')]
    pub precision: Vec<Precision>,

    #[arg(long)]
    pub text: bool,
}

/// Generates a synthetic five-criteria movie ratings dataset
#[derive(Args)]
pub struct GenerateOpts {
    #[arg(long, value_parser = parsers::non_zero_u32)]
    pub users: u32,

    #[arg(long, value_parser = parsers::non_zero_u32)]
    pub movies: u32,

    /// Probability of a user rating a movie
    #[arg(long, value_parser = parsers::probability)]
    pub fratings: f64,

    #[arg(short, long = "output")]
    pub output_path: PathBuf,

    #[arg(long)]
    pub text: bool,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn command_ok() {
        Opts::command().debug_assert();
    }

    #[test]
    fn train_defaults_ok() -> crate::Result {
        let opts = Opts::try_parse_from([
            "mcfs", "train", "--model", "pmf", "--train", "train.pb", "--output", "model.pb",
        ])?;
        match opts.subcommand {
            Subcommand::Train(opts) => {
                assert_eq!(opts.model, ModelKind::Pmf);
                assert!(opts.valid_path.is_none());
                assert_eq!(Hyperparameters::from(opts.pmf), Hyperparameters::default());
                assert_eq!(opts.neighbours.k, 0);
                assert_eq!(opts.neighbours.similarity, Similarity::Cosine);
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn binarize_lists_ok() -> crate::Result {
        let opts = Opts::try_parse_from([
            "mcfs",
            "binarize",
            "--output",
            "out.pb",
            "--minv",
            "1,1.5",
            "--maxv",
            "5,5",
            "--precision",
            "int",
        ])?;
        match opts.subcommand {
            Subcommand::Binarize(opts) => {
                assert_eq!(opts.minv, vec![1.0, 1.5]);
                assert_eq!(opts.maxv, vec![5.0, 5.0]);
                assert_eq!(opts.precision, vec![Precision::Int]);
                assert!(opts.input_path.is_none());
            }
            _ => unreachable!(),
        }
        Ok(())
    }

    #[test]
    fn fraction_out_of_range_fails() {
        let result = Opts::try_parse_from([
            "mcfs", "partition", "-i", "in.pb", "--part1", "a.pb", "--part2", "b.pb",
            "--fraction", "1",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn similarity_names_ok() -> crate::Result {
        let opts = Opts::try_parse_from([
            "mcfs", "train", "-m", "neighbours", "--train", "t.pb", "-o", "m.pb", "-k", "5",
            "--similarity", "norm-inf",
        ])?;
        match opts.subcommand {
            Subcommand::Train(opts) => {
                assert_eq!(opts.neighbours.k, 5);
                assert_eq!(opts.neighbours.similarity, Similarity::NormInf);
            }
            _ => unreachable!(),
        }
        Ok(())
    }
}
