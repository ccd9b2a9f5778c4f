//! Scores a saved model against the test set.

use crate::dataset::Dataset;
use crate::model;
use crate::opts::TestOpts;
use crate::prelude::*;

#[instrument(level = "info", skip_all, fields(model = ?opts.model))]
pub fn run(opts: TestOpts) -> Result {
    let model = model::load(opts.model, &opts.model_path)?;
    info!("model info:\n{}", model.info());

    let test_set = Dataset::load(&opts.test_path)?;
    let start_instant = Instant::now();
    let error = model.test(&test_set);
    info!(error, elapsed = ?start_instant.elapsed(), "tested");
    println!("Test RMSE: {}", error);
    Ok(())
}
