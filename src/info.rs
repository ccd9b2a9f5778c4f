//! Prints a dataset or model summary.

use rand::RngCore;

use crate::dataset::Dataset;
use crate::model;
use crate::opts::InfoOpts;
use crate::prelude::*;

pub fn run(opts: InfoOpts, rng: &mut dyn RngCore) -> Result {
    let info = match opts.model {
        Some(kind) => model::load(kind, &opts.input_path)?.info(),
        None => Dataset::load(&opts.input_path)?.info(opts.n, rng),
    };
    print!("{}", info);
    Ok(())
}
