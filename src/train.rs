//! Trains a model on the training set and saves it.

use rand::RngCore;

use crate::dataset::Dataset;
use crate::model::{self, Model, ModelKind, NeighboursModel, PmfModel};
use crate::opts::TrainOpts;
use crate::persistence::Format;
use crate::prelude::*;

#[instrument(level = "info", skip_all, fields(model = ?opts.model))]
pub fn run(opts: TrainOpts, rng: &mut dyn RngCore) -> Result {
    let train_set = Dataset::load(&opts.train_path)?;
    let valid_set = match &opts.valid_path {
        Some(path) => Dataset::load(path)?,
        None => train_set.empty_like(),
    };

    let mut model: Box<dyn Model> = match &opts.load_path {
        Some(path) => model::load(opts.model, path)?,
        None => match opts.model {
            ModelKind::Neighbours => {
                Box::new(NeighboursModel::new(opts.neighbours.k, opts.neighbours.similarity))
            }
            ModelKind::Pmf => Box::new(PmfModel::new(opts.pmf.into())),
        },
    };

    let valid_error = model.train(&train_set, &valid_set, rng)?;
    model.save(&opts.output_path, Format::from_text_flag(opts.text))?;
    info!(valid_error, path = ?opts.output_path, "saved");
    println!("Validation RMSE: {}", valid_error);
    Ok(())
}
