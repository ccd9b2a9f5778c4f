//! Synthetic multi-criteria movie ratings.
//!
//! The criteria are correlated like in the Yahoo! Movies dataset: standard normal draws
//! are multiplied by the Cholesky factor of its criteria correlation matrix, then scaled
//! and shifted to the observed standard deviation and means.

use rand::{Rng, RngCore};
use statrs::distribution::Normal;

use crate::dataset::{Dataset, Precision};
use crate::opts::GenerateOpts;
use crate::persistence::Format;
use crate::prelude::*;
use crate::protos;

const N_CRITERIA: usize = 5;
const MIN_SCORE: f32 = 1.0;
const MAX_SCORE: f32 = 13.0;

const AVERAGES: [f64; N_CRITERIA] = [9.6, 9.9, 9.5, 10.5, 9.5];
const STANDARD_DEVIATION: f64 = 2.90446;

/// Upper-triangular, applied as `draws × L`.
#[rustfmt::skip]
const CORRELATION_FACTOR: [[f64; N_CRITERIA]; N_CRITERIA] = [
    [1.0, 0.834,  0.871,  0.782,  0.905 ],
    [0.0, 0.5518, 0.2367, 0.2425, 0.1998],
    [0.0, 0.0,    0.4305, 0.2241, 0.1753],
    [0.0, 0.0,    0.0,    0.5286, 0.0729],
    [0.0, 0.0,    0.0,    0.0,    0.3241],
];

#[instrument(level = "info", skip_all, fields(users = opts.users, movies = opts.movies))]
pub fn run(opts: GenerateOpts, rng: &mut dyn RngCore) -> Result {
    let dataset = generate(opts.users, opts.movies, opts.fratings, rng)?;
    info!(n_ratings = dataset.len(), "generated");
    dataset.save(&opts.output_path, Format::from_text_flag(opts.text))
}

/// Rates every (user, movie) pair with the `fratings` probability.
pub fn generate<R: Rng + ?Sized>(
    n_users: u32,
    n_movies: u32,
    fratings: f64,
    rng: &mut R,
) -> Result<Dataset> {
    let normal = Normal::new(0.0, 1.0)?;
    let mut ratings = Vec::new();
    for user in 0..n_users {
        for item in 0..n_movies {
            if rng.gen_bool(fratings) {
                let draws: [f64; N_CRITERIA] = std::array::from_fn(|_| rng.sample(&normal));
                ratings.push(protos::Rating {
                    user,
                    item,
                    scores: correlated_scores(&draws),
                });
            }
        }
    }
    Dataset::from_record(protos::Ratings {
        ratings,
        criteria_size: N_CRITERIA as u32,
        num_users: n_users,
        num_items: n_movies,
        minv: vec![MIN_SCORE; N_CRITERIA],
        maxv: vec![MAX_SCORE; N_CRITERIA],
        precision: vec![Precision::Int as i32],
    })
}

fn correlated_scores(draws: &[f64; N_CRITERIA]) -> Vec<f32> {
    (0..N_CRITERIA)
        .map(|c| {
            let correlated: f64 = draws
                .iter()
                .zip(&CORRELATION_FACTOR)
                .map(|(draw, row)| draw * row[c])
                .sum();
            let score = (AVERAGES[c] + STANDARD_DEVIATION * correlated) as f32;
            score.clamp(MIN_SCORE, MAX_SCORE).round()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn zero_draws_give_averages_ok() {
        assert_eq!(correlated_scores(&[0.0; N_CRITERIA]), vec![10.0, 10.0, 10.0, 11.0, 10.0]);
    }

    #[test]
    fn scores_are_clamped_ok() {
        assert_eq!(correlated_scores(&[10.0; N_CRITERIA]), vec![MAX_SCORE; N_CRITERIA]);
        assert_eq!(correlated_scores(&[-10.0; N_CRITERIA]), vec![MIN_SCORE; N_CRITERIA]);
    }

    #[test]
    fn generate_ok() -> crate::Result {
        let dataset = generate(20, 30, 0.5, &mut StdRng::seed_from_u64(42))?;
        assert_eq!(dataset.users(), 20);
        assert_eq!(dataset.items(), 30);
        assert_eq!(dataset.criteria_size(), N_CRITERIA);
        assert_eq!(dataset.precision(), &[Precision::Int; N_CRITERIA]);
        assert!(dataset.len() > 200 && dataset.len() < 400);
        for rating in dataset.ratings() {
            assert!(rating
                .scores
                .iter()
                .all(|score| (MIN_SCORE..=MAX_SCORE).contains(score) && score.fract() == 0.0));
        }
        Ok(())
    }

    #[test]
    fn nothing_rated_ok() -> crate::Result {
        let dataset = generate(3, 4, 0.0, &mut StdRng::seed_from_u64(0))?;
        assert!(dataset.is_empty());
        assert_eq!(dataset.users(), 3);
        assert_eq!(dataset.minv(), &[MIN_SCORE; N_CRITERIA]);
        Ok(())
    }
}
