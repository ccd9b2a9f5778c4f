//! Rating prediction models.

use std::path::Path;

use clap::ValueEnum;
use rand::RngCore;

use crate::dataset::{Dataset, Rating};
use crate::persistence::Format;
use crate::prelude::*;

pub mod neighbours;
pub mod pmf;

pub use self::neighbours::NeighboursModel;
pub use self::pmf::PmfModel;

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Similarity-weighted nearest neighbours
    Neighbours,

    /// Probabilistic matrix factorization
    Pmf,
}

pub trait Model {
    /// Fits the model and returns the validation error.
    fn train(
        &mut self,
        train_set: &Dataset,
        valid_set: &Dataset,
        rng: &mut dyn RngCore,
    ) -> Result<f32>;

    /// Overwrites the scores of the ratings with the predictions.
    fn test_batch(&self, ratings: &mut [Rating]);

    /// Whether [`Model::test_batch`] predicts in the `[0, 1]` scale.
    ///
    /// [`Model::test`] erases the scores before predicting, so a rating the model
    /// leaves untouched scores 0 here and counts as a `minv` prediction in the error.
    fn predicts_normal_scale(&self) -> bool {
        false
    }

    /// Predicts the dataset ratings and returns the error against the actual scores.
    fn test(&self, test_set: &Dataset) -> f32 {
        let start_instant = Instant::now();
        let mut predictions = test_set.clone();
        predictions.erase_scores();
        self.test_batch(predictions.ratings_mut());
        if self.predicts_normal_scale() {
            predictions.to_original_scale();
        }
        debug!(n_ratings = test_set.len(), elapsed = ?start_instant.elapsed(), "tested");
        Dataset::rmse(test_set, &predictions)
    }

    fn load(&mut self, path: &Path) -> Result;

    fn save(&self, path: &Path, format: Format) -> Result;

    fn info(&self) -> String;
}

/// Instantiates the model from the saved configuration.
pub fn load(kind: ModelKind, path: &Path) -> Result<Box<dyn Model>> {
    let mut model: Box<dyn Model> = match kind {
        ModelKind::Neighbours => Box::new(NeighboursModel::default()),
        ModelKind::Pmf => Box::new(PmfModel::default()),
    };
    model.load(path)?;
    Ok(model)
}
