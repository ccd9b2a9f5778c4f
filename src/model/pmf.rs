//! Probabilistic matrix factorization with implicit feedback.
//!
//! The score of the criterion `c` for the user `i` and item `j` is predicted as
//! `logistic((Y[c, i] + H[c, i]) · V[c, j])`, where `H[c, i]` averages `W[c, j']`
//! over the items `j'` rated by the user. `HY = Y + H` is cached after every update.

use std::fmt::{Display, Formatter, Write};
use std::ops::Range;
use std::path::Path;

use clap::ValueEnum;
use rand::{Rng, RngCore};

use self::tensor::Tensor;
use crate::dataset::{Dataset, Rating};
use crate::math::logistic;
use crate::math::vector::{axpy, dot};
use crate::model::Model;
use crate::persistence::{read_message, write_message, Format};
use crate::prelude::*;
use crate::protos::PmfModelConfig;

mod tensor;

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration, ValueEnum,
)]
#[repr(i32)]
pub enum MatrixInit {
    /// Deterministic ramp over the flattened tensor
    Static = 0,

    /// Standard normal draws
    Normal = 1,

    /// Uniform draws from `[0, 1)`
    Uniform = 2,
}

impl Display for MatrixInit {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Static => "STATIC",
            Self::Normal => "NORMAL",
            Self::Uniform => "UNIFORM",
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hyperparameters {
    pub factors: u32,
    pub max_iters: u32,
    pub batch_size: u32,
    pub learning_rate: f32,
    pub momentum: f32,
    pub ly: f32,
    pub lv: f32,
    pub lw: f32,
    pub matrix_init: MatrixInit,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            factors: 10,
            max_iters: 100,
            batch_size: 100,
            learning_rate: 0.1,
            momentum: 0.0,
            ly: 0.0,
            lv: 0.0,
            lw: 0.0,
            matrix_init: MatrixInit::Static,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct PmfModel {
    params: Hyperparameters,

    /// Training set in the original scale.
    data: Dataset,

    /// `None` until trained or loaded.
    factors: Option<Factors>,
}

impl PmfModel {
    pub fn new(params: Hyperparameters) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    /// Drops the factors and the training set, and resets the hyperparameters.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn from_config(config: PmfModelConfig) -> Result<Self> {
        let matrix_init = MatrixInit::from_i32(config.matrix_init)
            .ok_or_else(|| anyhow!("invalid matrix init `{}`", config.matrix_init))?;
        let params = Hyperparameters {
            factors: config.factors,
            max_iters: config.max_iters,
            batch_size: config.batch_size,
            learning_rate: config.learning_rate,
            momentum: config.momentum,
            ly: config.ly,
            lv: config.lv,
            lw: config.lw,
            matrix_init,
        };
        let data = Dataset::from_record(config.ratings.unwrap_or_default())?;
        let factors = if config.y.is_empty() && config.v.is_empty() && config.w.is_empty() {
            None
        } else {
            let shape = Shape::of(&data, params.factors as usize);
            Some(Factors::from_buffers(shape, config.y, config.v, config.w, config.hy, &data)?)
        };
        Ok(Self {
            params,
            data,
            factors,
        })
    }

    #[must_use]
    pub fn to_config(&self) -> PmfModelConfig {
        let (y, v, w, hy) = match &self.factors {
            Some(factors) => (
                factors.y.as_slice().to_vec(),
                factors.v.as_slice().to_vec(),
                factors.w.as_slice().to_vec(),
                factors.hy.as_slice().to_vec(),
            ),
            None => Default::default(),
        };
        PmfModelConfig {
            ratings: Some(self.data.to_record()),
            y,
            v,
            w,
            hy,
            factors: self.params.factors,
            max_iters: self.params.max_iters,
            batch_size: self.params.batch_size,
            learning_rate: self.params.learning_rate,
            momentum: self.params.momentum,
            ly: self.params.ly,
            lv: self.params.lv,
            lw: self.params.lw,
            matrix_init: self.params.matrix_init as i32,
        }
    }

    /// Logs the full-set loss and errors, and returns the validation error.
    fn report(
        &self,
        iteration: u32,
        factors: &Factors,
        working_set: &Dataset,
        train_set: &Dataset,
        valid_set: &Dataset,
    ) -> f32 {
        let loss = factors.loss(working_set, &self.params);
        let train_error = factors.rmse(train_set);
        let valid_error = if valid_set.is_empty() {
            0.0
        } else {
            factors.rmse(valid_set)
        };
        info!(iteration, loss, train_error, valid_error);
        valid_error
    }
}

impl Model for PmfModel {
    #[instrument(
        level = "info",
        skip_all,
        fields(n_factors = self.params.factors, max_iters = self.params.max_iters)
    )]
    fn train(
        &mut self,
        train_set: &Dataset,
        valid_set: &Dataset,
        rng: &mut dyn RngCore,
    ) -> Result<f32> {
        let start_instant = Instant::now();
        let params = self.params;
        let shape = Shape::of(train_set, params.factors as usize);
        self.data = train_set.clone();

        let mut factors = match self.factors.take() {
            Some(factors) if factors.shape == shape => {
                info!("continuing with the loaded factors");
                factors
            }
            previous => {
                if previous.is_some() {
                    warn!("the loaded factors do not match the training set, reinitializing");
                }
                Factors::init(shape, params.matrix_init, rng)?
            }
        };

        let mut working_set = train_set.clone();
        working_set.to_normal_scale();
        working_set.shuffle(rng);
        factors.refresh_hy(&working_set);
        let mut valid_error = self.report(0, &factors, &working_set, train_set, valid_set);

        let total = working_set.len();
        if total == 0 {
            warn!("the training set is empty");
        } else {
            let mut previous = Gradients::zeros(shape);
            for iteration in 1..=params.max_iters {
                let window = batch_window(total, params.batch_size as usize, rng);
                let batch = &working_set.ratings()[window];
                factors.descend(batch, &working_set, &params, &mut previous);
                valid_error =
                    self.report(iteration, &factors, &working_set, train_set, valid_set);
            }
        }

        info!(valid_error, elapsed = ?start_instant.elapsed(), "trained");
        self.factors = Some(factors);
        Ok(valid_error)
    }

    fn test_batch(&self, ratings: &mut [Rating]) {
        match &self.factors {
            Some(factors) => factors.predict_batch(ratings),
            None => warn!(n_ratings = ratings.len(), "the model is not trained"),
        }
    }

    fn predicts_normal_scale(&self) -> bool {
        true
    }

    fn load(&mut self, path: &Path) -> Result {
        *self = Self::from_config(read_message(path)?)
            .with_context(|| format!("failed to load the PMF model from `{:?}`", path))?;
        Ok(())
    }

    fn save(&self, path: &Path, format: Format) -> Result {
        write_message(path, &self.to_config(), format)
    }

    fn info(&self) -> String {
        let mut info = String::new();
        let _ = writeln!(info, "Factors = {}", self.params.factors);
        let _ = writeln!(info, "Max iterations = {}", self.params.max_iters);
        let _ = writeln!(info, "Batch size = {}", self.params.batch_size);
        let _ = writeln!(info, "Learning rate = {}", self.params.learning_rate);
        let _ = writeln!(info, "Momentum = {}", self.params.momentum);
        let _ = writeln!(
            info,
            "Regularization = {}, {}, {}",
            self.params.ly, self.params.lv, self.params.lw,
        );
        let _ = writeln!(info, "Matrix init = {}", self.params.matrix_init);
        let _ = writeln!(info, "Trained = {}", self.factors.is_some());
        info + &self.data.summary()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct Shape {
    n_criteria: usize,
    n_users: usize,
    n_items: usize,
    n_factors: usize,
}

impl Shape {
    fn of(dataset: &Dataset, n_factors: usize) -> Self {
        Self {
            n_criteria: dataset.criteria_size(),
            n_users: dataset.users() as usize,
            n_items: dataset.items() as usize,
            n_factors,
        }
    }
}

#[derive(Clone, Debug)]
struct Factors {
    shape: Shape,

    /// User factors, `[criteria][users][factors]`.
    y: Tensor,

    /// Item factors, `[criteria][items][factors]`.
    v: Tensor,

    /// Implicit feedback item factors, `[criteria][items][factors]`.
    w: Tensor,

    /// `Y + H`, `[criteria][users][factors]`.
    hy: Tensor,
}

impl Factors {
    fn init<R: Rng + ?Sized>(shape: Shape, init: MatrixInit, rng: &mut R) -> Result<Self> {
        let Shape {
            n_criteria,
            n_users,
            n_items,
            n_factors,
        } = shape;
        debug!(?shape, %init, "initializing the factors");
        Ok(Self {
            shape,
            y: Tensor::init(init, n_criteria, n_users, n_factors, rng)?,
            v: Tensor::init(init, n_criteria, n_items, n_factors, rng)?,
            w: Tensor::init(init, n_criteria, n_items, n_factors, rng)?,
            hy: Tensor::zeros(n_criteria, n_users, n_factors),
        })
    }

    /// Restores the persisted tensors. The cached `HY` is recomputed when missing.
    fn from_buffers(
        shape: Shape,
        y: Vec<f32>,
        v: Vec<f32>,
        w: Vec<f32>,
        hy: Vec<f32>,
        dataset: &Dataset,
    ) -> Result<Self> {
        let Shape {
            n_criteria,
            n_users,
            n_items,
            n_factors,
        } = shape;
        let recompute_hy = hy.is_empty();
        let mut this = Self {
            shape,
            y: Tensor::from_buffer(n_criteria, n_users, n_factors, y).context("invalid Y")?,
            v: Tensor::from_buffer(n_criteria, n_items, n_factors, v).context("invalid V")?,
            w: Tensor::from_buffer(n_criteria, n_items, n_factors, w).context("invalid W")?,
            hy: if recompute_hy {
                Tensor::zeros(n_criteria, n_users, n_factors)
            } else {
                Tensor::from_buffer(n_criteria, n_users, n_factors, hy).context("invalid HY")?
            },
        };
        if recompute_hy {
            debug!("recomputing the missing HY");
            this.refresh_hy(dataset);
        }
        Ok(this)
    }

    /// Recomputes `HY = Y + H` from the current `Y` and `W`.
    fn refresh_hy(&mut self, dataset: &Dataset) {
        assert_eq!(dataset.users() as usize, self.shape.n_users, "number of users mismatch");
        for user in 0..self.shape.n_users {
            let user_ratings = dataset.ratings_by_user(user as u32);
            let weight = 1.0 / user_ratings.len().max(1) as f32;
            for c in 0..self.shape.n_criteria {
                let hy = self.hy.row_mut(c, user);
                hy.copy_from_slice(self.y.row(c, user));
                for rating in user_ratings.clone() {
                    axpy(weight, self.w.row(c, rating.item() as usize), hy);
                }
            }
        }
    }

    #[inline]
    fn predict(&self, criterion: usize, user: usize, item: usize) -> f32 {
        logistic(dot(self.hy.row(criterion, user), self.v.row(criterion, item)))
    }

    /// Writes the normal-scale predictions. Unknown users and items are left untouched.
    fn predict_batch(&self, ratings: &mut [Rating]) {
        let mut n_skipped = 0_usize;
        for rating in ratings.iter_mut() {
            let (user, item) = (rating.user() as usize, rating.item() as usize);
            if user >= self.shape.n_users || item >= self.shape.n_items {
                debug!(user, item, "no prediction for an unknown user or item");
                n_skipped += 1;
                continue;
            }
            assert_eq!(rating.scores.len(), self.shape.n_criteria, "criteria size mismatch");
            for (c, score) in rating.scores.iter_mut().enumerate() {
                *score = self.predict(c, user, item);
            }
        }
        if n_skipped != 0 {
            warn!(n_skipped, "some ratings have unknown users or items");
        }
    }

    /// Root-mean-square error in the original scale of the dataset.
    fn rmse(&self, dataset: &Dataset) -> f32 {
        let mut predictions = dataset.clone();
        predictions.erase_scores();
        self.predict_batch(predictions.ratings_mut());
        predictions.to_original_scale();
        Dataset::rmse(dataset, &predictions)
    }

    /// Regularized squared error over the normal-scale dataset.
    fn loss(&self, dataset: &Dataset, params: &Hyperparameters) -> f32 {
        let mut loss = 0.0;
        for rating in dataset.ratings() {
            let (user, item) = (rating.user() as usize, rating.item() as usize);
            for (c, score) in rating.scores.iter().enumerate() {
                loss += (self.predict(c, user, item) - score).powi(2);
            }
        }
        0.5 * (loss
            + params.ly * self.y.squared_norm()
            + params.lv * self.v.squared_norm()
            + params.lw * self.w.squared_norm())
    }

    /// Gradient of the regularized loss restricted to the batch.
    ///
    /// `dataset` is the normal-scale training set the batch is taken from:
    /// a rating contributes to `W` of every item rated by the same user.
    fn gradient(&self, batch: &[Rating], dataset: &Dataset, params: &Hyperparameters) -> Gradients {
        let mut gradients = Gradients::zeros(self.shape);
        for rating in batch {
            let (user, item) = (rating.user() as usize, rating.item() as usize);
            let user_ratings = dataset.ratings_by_user(rating.user());
            let weight = 1.0 / user_ratings.len().max(1) as f32;
            for (c, score) in rating.scores.iter().enumerate() {
                let hy = self.hy.row(c, user);
                let v = self.v.row(c, item);
                let prediction = logistic(dot(hy, v));
                let error = (prediction - score) * prediction * (1.0 - prediction);
                axpy(error, v, gradients.y.row_mut(c, user));
                axpy(error, hy, gradients.v.row_mut(c, item));
                for rated in user_ratings.clone() {
                    axpy(error * weight, v, gradients.w.row_mut(c, rated.item() as usize));
                }
            }
        }
        gradients.y.add_scaled(params.ly, &self.y);
        gradients.v.add_scaled(params.lv, &self.v);
        gradients.w.add_scaled(params.lw, &self.w);
        gradients
    }

    /// Moves along `gradient - momentum × previous` and refreshes `HY`.
    /// `previous` is then replaced by the adjusted gradient.
    fn descend(
        &mut self,
        batch: &[Rating],
        dataset: &Dataset,
        params: &Hyperparameters,
        previous: &mut Gradients,
    ) {
        let mut gradients = self.gradient(batch, dataset, params);
        gradients.add_scaled(-params.momentum, previous);
        self.step(params.learning_rate, &gradients);
        self.refresh_hy(dataset);
        *previous = gradients;
    }

    fn step(&mut self, learning_rate: f32, gradients: &Gradients) {
        self.y.add_scaled(-learning_rate, &gradients.y);
        self.v.add_scaled(-learning_rate, &gradients.v);
        self.w.add_scaled(-learning_rate, &gradients.w);
    }
}

/// Random contiguous window of `batch_size` ratings, the size clamped to `[1, total]`.
fn batch_window<R: Rng + ?Sized>(total: usize, batch_size: usize, rng: &mut R) -> Range<usize> {
    assert_ne!(total, 0, "no ratings to sample from");
    let batch_size = batch_size.clamp(1, total);
    let offset = rng.gen_range(0..=(total - batch_size));
    offset..offset + batch_size
}

#[derive(Clone, Debug)]
struct Gradients {
    y: Tensor,
    v: Tensor,
    w: Tensor,
}

impl Gradients {
    fn zeros(shape: Shape) -> Self {
        Self {
            y: Tensor::zeros(shape.n_criteria, shape.n_users, shape.n_factors),
            v: Tensor::zeros(shape.n_criteria, shape.n_items, shape.n_factors),
            w: Tensor::zeros(shape.n_criteria, shape.n_items, shape.n_factors),
        }
    }

    fn add_scaled(&mut self, alpha: f32, other: &Self) {
        self.y.add_scaled(alpha, &other.y);
        self.v.add_scaled(alpha, &other.v);
        self.w.add_scaled(alpha, &other.w);
    }
}
