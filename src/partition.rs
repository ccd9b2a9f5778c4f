//! Splits a dataset in two random parts.

use rand::RngCore;

use crate::dataset::Dataset;
use crate::opts::PartitionOpts;
use crate::persistence::Format;
use crate::prelude::*;

#[instrument(level = "info", skip_all, fields(fraction = opts.fraction))]
pub fn run(opts: PartitionOpts, rng: &mut dyn RngCore) -> Result {
    let format = Format::from_text_flag(opts.text);
    let mut part_1 = Dataset::load(&opts.input_path)?;
    let part_2 = part_1.partition(opts.fraction, rng);
    part_1.save(&opts.part_1_path, format)?;
    part_2.save(&opts.part_2_path, format)?;
    info!(n_part_1 = part_1.len(), n_part_2 = part_2.len(), "partitioned");
    Ok(())
}
