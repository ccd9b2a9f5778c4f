use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::opts::{Opts, Subcommand};
use crate::prelude::*;

mod binarize;
mod dataset;
mod evaluate;
mod generate;
mod helpers;
mod info;
mod math;
mod model;
mod opts;
mod partition;
mod persistence;
mod prelude;
mod protos;
mod similarity;
mod train;

fn main() -> Result {
    let opts = Opts::parse();
    helpers::tracing::init()?;
    info!(version = env!("CARGO_PKG_VERSION"), seed = opts.seed, "starting…");

    let start_instant = Instant::now();
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let result = match opts.subcommand {
        Subcommand::Train(opts) => train::run(opts, &mut rng),
        Subcommand::Test(opts) => evaluate::run(opts),
        Subcommand::Partition(opts) => partition::run(opts, &mut rng),
        Subcommand::Info(opts) => info::run(opts, &mut rng),
        Subcommand::Binarize(opts) => binarize::run(opts),
        Subcommand::Generate(opts) => generate::run(opts, &mut rng),
    };

    info!(elapsed = %helpers::tracing::format_elapsed(start_instant), "finished");
    result
}
