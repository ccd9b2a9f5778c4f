//! In-memory rating collection with its user and item indices.

use std::fmt::{Display, Formatter, Write};

use clap::ValueEnum;
use itertools::{merge_join_by, EitherOrBoth};
use rand::seq::SliceRandom;
use rand::Rng;

pub use self::rating::Rating;
use crate::math::error::Error;
use crate::prelude::*;

mod rating;
mod record;

/// Upper bound for the number of users and the number of items, since the indices are dense.
pub const MAX_ENTITIES: u32 = 1 << 24;

/// Controls rounding when converting predictions back to the original scale.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration, ValueEnum,
)]
#[repr(i32)]
pub enum Precision {
    Int = 0,
    Float = 1,
}

impl Display for Precision {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Int => "INT",
            Self::Float => "FLOAT",
        })
    }
}

/// Ratings plus per-criterion metadata.
///
/// The indices hold positions into `ratings`: `by_user[u]` is sorted by item,
/// `by_item[i]` is sorted by user. Every method that changes the ratings structure
/// rebuilds them before returning.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    ratings: Vec<Rating>,
    criteria_size: usize,
    minv: Vec<f32>,
    maxv: Vec<f32>,
    precision: Vec<Precision>,
    num_users: u32,
    num_items: u32,

    by_user: Vec<Vec<usize>>,
    by_item: Vec<Vec<usize>>,
}

impl Dataset {
    /// Builds a dataset inferring the criteria size, the number of users and items,
    /// and the score bounds from the ratings. Every criterion gets the float precision.
    #[cfg(test)]
    pub fn from_ratings(ratings: Vec<Rating>) -> Self {
        let criteria_size = ratings.first().map_or(0, |rating| rating.scores.len());
        for rating in &ratings {
            assert_eq!(rating.scores.len(), criteria_size, "inconsistent criteria size");
        }
        let (minv, maxv) = scan_bounds(&ratings, criteria_size);
        let (num_users, num_items) = scan_shape(&ratings);
        let mut this = Self {
            ratings,
            criteria_size,
            minv,
            maxv,
            precision: vec![Precision::Float; criteria_size],
            num_users,
            num_items,
            by_user: Vec::new(),
            by_item: Vec::new(),
        };
        this.prepare_aux();
        this
    }

    #[must_use]
    pub fn with_bounds(mut self, minv: Vec<f32>, maxv: Vec<f32>) -> Self {
        assert_eq!(minv.len(), self.criteria_size);
        assert_eq!(maxv.len(), self.criteria_size);
        self.minv = minv;
        self.maxv = maxv;
        self
    }

    #[cfg(test)]
    pub fn with_precision(mut self, precision: Vec<Precision>) -> Self {
        assert_eq!(precision.len(), self.criteria_size);
        self.precision = precision;
        self
    }

    /// Raises the number of users and items, for example to reserve ids which are not rated yet.
    #[cfg(test)]
    pub fn with_shape(mut self, num_users: u32, num_items: u32) -> Self {
        self.num_users = self.num_users.max(num_users);
        self.num_items = self.num_items.max(num_items);
        self.prepare_aux();
        self
    }

    /// Same metadata, no ratings.
    #[must_use]
    pub fn empty_like(&self) -> Self {
        let mut this = Self {
            ratings: Vec::new(),
            criteria_size: self.criteria_size,
            minv: self.minv.clone(),
            maxv: self.maxv.clone(),
            precision: self.precision.clone(),
            num_users: self.num_users,
            num_items: self.num_items,
            by_user: Vec::new(),
            by_item: Vec::new(),
        };
        this.prepare_aux();
        this
    }

    #[must_use]
    pub fn ratings(&self) -> &[Rating] {
        &self.ratings
    }

    /// Scores are mutable, user and item ids are not, so the indices stay valid.
    pub fn ratings_mut(&mut self) -> &mut [Rating] {
        &mut self.ratings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    #[must_use]
    pub const fn criteria_size(&self) -> usize {
        self.criteria_size
    }

    #[must_use]
    pub const fn users(&self) -> u32 {
        self.num_users
    }

    #[must_use]
    pub const fn items(&self) -> u32 {
        self.num_items
    }

    #[must_use]
    pub fn minv(&self) -> &[f32] {
        &self.minv
    }

    #[must_use]
    pub fn maxv(&self) -> &[f32] {
        &self.maxv
    }

    #[must_use]
    pub fn precision(&self) -> &[Precision] {
        &self.precision
    }

    /// Middle of the score range of each criterion.
    #[must_use]
    pub fn midpoint(&self) -> Vec<f32> {
        self.minv
            .iter()
            .zip(&self.maxv)
            .map(|(min, max)| (min + max) / 2.0)
            .collect()
    }

    /// Rebuilds the user and item indices.
    pub fn prepare_aux(&mut self) {
        self.by_user = vec![Vec::new(); self.num_users as usize];
        self.by_item = vec![Vec::new(); self.num_items as usize];
        for (index, rating) in self.ratings.iter().enumerate() {
            self.by_user[rating.user() as usize].push(index);
            self.by_item[rating.item() as usize].push(index);
        }
        let ratings = &self.ratings;
        for bucket in self.by_user.iter_mut() {
            bucket.sort_by_key(|&index| ratings[index].item());
        }
        for bucket in self.by_item.iter_mut() {
            bucket.sort_by_key(|&index| ratings[index].user());
        }
    }

    /// User's ratings sorted by item.
    pub fn ratings_by_user(
        &self,
        user: u32,
    ) -> impl ExactSizeIterator<Item = &Rating> + Clone + '_ {
        assert!(user < self.num_users, "user {} is out of [0, {})", user, self.num_users);
        self.by_user[user as usize]
            .iter()
            .map(move |&index| &self.ratings[index])
    }

    /// Item's ratings sorted by user.
    pub fn ratings_by_item(
        &self,
        item: u32,
    ) -> impl ExactSizeIterator<Item = &Rating> + Clone + '_ {
        assert!(item < self.num_items, "item {} is out of [0, {})", item, self.num_items);
        self.by_item[item as usize]
            .iter()
            .map(move |&index| &self.ratings[index])
    }

    /// Merge-joins the ratings of the two users by item.
    ///
    /// For every commonly rated item, appends all the criteria scores of the first user
    /// to the first vector, and of the second user to the second one. The vectors are
    /// ordered by item. Unknown users have no ratings.
    #[must_use]
    pub fn get_scores_from_common_ratings_by_users(
        &self,
        user_1: u32,
        user_2: u32,
    ) -> (Vec<f32>, Vec<f32>) {
        let mut scores_1 = Vec::new();
        let mut scores_2 = Vec::new();
        if user_1 >= self.num_users || user_2 >= self.num_users {
            return (scores_1, scores_2);
        }
        let common = merge_join_by(
            self.ratings_by_user(user_1),
            self.ratings_by_user(user_2),
            |left, right| left.item().cmp(&right.item()),
        );
        for pair in common {
            if let EitherOrBoth::Both(left, right) = pair {
                scores_1.extend_from_slice(&left.scores);
                scores_2.extend_from_slice(&right.scores);
            }
        }
        (scores_1, scores_2)
    }

    /// Uniformly permutes the ratings.
    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.ratings.shuffle(rng);
        self.prepare_aux();
    }

    /// Shuffles the ratings, keeps the `fraction` head and returns the remaining tail
    /// as a new dataset with the same metadata.
    #[instrument(level = "debug", skip(self, rng))]
    pub fn partition<R: Rng + ?Sized>(&mut self, fraction: f64, rng: &mut R) -> Self {
        assert!((0.0..=1.0).contains(&fraction), "fraction must be within [0, 1]");

        self.ratings.shuffle(rng);
        let start = (fraction * self.ratings.len() as f64) as usize;
        let mut partition = self.empty_like();
        partition.ratings = self.ratings.split_off(start);
        self.prepare_aux();
        partition.prepare_aux();

        debug!(n_head = self.len(), n_tail = partition.len());
        if self.is_empty() || partition.is_empty() {
            warn!("some partition is empty");
        }
        partition
    }

    /// Maps every score to `[0, 1]` using the criterion bounds.
    pub fn to_normal_scale(&mut self) {
        for rating in self.ratings.iter_mut() {
            for (c, score) in rating.scores.iter_mut().enumerate() {
                let range = self.maxv[c] - self.minv[c];
                *score = if range != 0.0 {
                    (*score - self.minv[c]) / range
                } else {
                    0.0
                };
            }
        }
    }

    /// Inverse of [`Dataset::to_normal_scale`], except that integer criteria get rounded.
    pub fn to_original_scale(&mut self) {
        for rating in self.ratings.iter_mut() {
            for (c, score) in rating.scores.iter_mut().enumerate() {
                *score = *score * (self.maxv[c] - self.minv[c]) + self.minv[c];
                if self.precision[c] == Precision::Int {
                    *score = score.round();
                }
            }
        }
    }

    pub fn erase_scores(&mut self) {
        for rating in self.ratings.iter_mut() {
            rating.scores.fill(0.0);
        }
    }

    /// Root-mean-square error over every score of every rating.
    ///
    /// # Panics
    ///
    /// The datasets must have the same number of ratings and criteria.
    #[must_use]
    pub fn rmse(a: &Self, b: &Self) -> f32 {
        assert_eq!(a.criteria_size, b.criteria_size, "criteria size mismatch");
        rmse(&a.ratings, &b.ratings)
    }

    /// Human-readable summary followed by `n` random ratings.
    pub fn info<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> String {
        let mut info = self.summary();
        for rating in self.ratings.choose_multiple(rng, n) {
            let _ = writeln!(info, "{}", rating);
        }
        info
    }

    /// Counts and per-criterion metadata.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut info = String::new();
        let density = self.len() as f64 / (self.num_users as f64 * self.num_items as f64);
        let _ = writeln!(info, "Ratings = {}", self.len());
        let _ = writeln!(info, "Users = {}", self.num_users);
        let _ = writeln!(info, "Items = {}", self.num_items);
        let _ = writeln!(info, "Density = {:.6}", if density.is_finite() { density } else { 0.0 });
        let _ = writeln!(info, "Criteria = {}", self.criteria_size);
        for c in 0..self.criteria_size {
            let mean = self
                .ratings
                .iter()
                .map(|rating| rating.scores[c] as f64)
                .sum::<f64>()
                / self.len().max(1) as f64;
            let _ = writeln!(
                info,
                "Criterion #{}: min = {}, max = {}, precision = {}, mean = {:.4}",
                c, self.minv[c], self.maxv[c], self.precision[c], mean,
            );
        }
        info
    }
}

/// Root-mean-square error between the corresponding ratings.
///
/// # Panics
///
/// The slices must have equal lengths, and corresponding ratings the same number of scores.
#[must_use]
pub fn rmse(a: &[Rating], b: &[Rating]) -> f32 {
    assert_eq!(a.len(), b.len(), "number of ratings mismatch");
    let mut error = Error::default();
    for (x, y) in a.iter().zip(b) {
        assert_eq!(x.scores.len(), y.scores.len(), "criteria size mismatch");
        for (xc, yc) in x.scores.iter().zip(&y.scores) {
            error.push(xc - yc);
        }
    }
    error.average()
}

/// Per-criterion minimum and maximum, zeros when there are no ratings.
fn scan_bounds(ratings: &[Rating], criteria_size: usize) -> (Vec<f32>, Vec<f32>) {
    if ratings.is_empty() {
        return (vec![0.0; criteria_size], vec![0.0; criteria_size]);
    }
    let mut minv = vec![f32::INFINITY; criteria_size];
    let mut maxv = vec![f32::NEG_INFINITY; criteria_size];
    for rating in ratings {
        for (c, score) in rating.scores.iter().enumerate() {
            minv[c] = minv[c].min(*score);
            maxv[c] = maxv[c].max(*score);
        }
    }
    (minv, maxv)
}

/// Smallest number of users and items covering every rating.
fn scan_shape(ratings: &[Rating]) -> (u32, u32) {
    ratings.iter().fold((0, 0), |(num_users, num_items), rating| {
        (
            num_users.max(rating.user().saturating_add(1)),
            num_items.max(rating.item().saturating_add(1)),
        )
    })
}
