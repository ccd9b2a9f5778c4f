//! User-based nearest neighbours.

use std::fmt::Write;
use std::path::Path;

use rand::RngCore;

use crate::dataset::{Dataset, Precision, Rating};
use crate::model::Model;
use crate::persistence::{read_message, write_message, Format};
use crate::prelude::*;
use crate::protos::NeighboursModelConfig;
use crate::similarity::Similarity;

/// Similarities memoized by the unordered pair of users.
type SimilarityCache = AHashMap<(u32, u32), f32>;

#[derive(Clone, Debug)]
pub struct NeighboursModel {
    data: Dataset,

    /// Neighbourhood size, `0` means all the neighbours.
    k: u32,

    similarity: Similarity,
}

impl Default for NeighboursModel {
    fn default() -> Self {
        Self::new(0, Similarity::Cosine)
    }
}

impl NeighboursModel {
    pub fn new(k: u32, similarity: Similarity) -> Self {
        Self {
            data: Dataset::default(),
            k,
            similarity,
        }
    }

    pub fn from_config(config: NeighboursModelConfig) -> Result<Self> {
        let similarity = Similarity::from_i32(config.similarity)
            .ok_or_else(|| anyhow!("invalid similarity `{}`", config.similarity))?;
        Ok(Self {
            data: Dataset::from_record(config.ratings.unwrap_or_default())?,
            k: config.k,
            similarity,
        })
    }

    #[must_use]
    pub fn to_config(&self) -> NeighboursModelConfig {
        NeighboursModelConfig {
            ratings: Some(self.data.to_record()),
            k: self.k,
            similarity: self.similarity as i32,
        }
    }

    fn predict(&self, prediction: &mut Rating, cache: &mut SimilarityCache) {
        let (user, item) = (prediction.user(), prediction.item());

        if item >= self.data.items() || self.data.ratings_by_item(item).len() == 0 {
            debug!(user, item, "item has not been rated before, using the midpoint");
            prediction.scores = self.data.midpoint();
            return;
        }
        let item_ratings = self.data.ratings_by_item(item);

        if let Some(own_rating) = item_ratings.clone().find(|rating| rating.user() == user) {
            prediction.scores.clone_from(&own_rating.scores);
            return;
        }

        let mut neighbours: Vec<(f32, &Rating)> = item_ratings
            .filter_map(|rating| {
                let similarity = self.similarity_between(user, rating.user(), cache);
                (similarity > 0.0).then_some((similarity, rating))
            })
            .collect();
        if neighbours.is_empty() {
            warn!(user, item, "no similar users rated the item");
            return;
        }
        neighbours.sort_by(|(lhs, _), (rhs, _)| rhs.total_cmp(lhs));

        let mut scores = if neighbours[0].0 == f32::INFINITY {
            let exact_matches = neighbours
                .iter()
                .take_while(|(similarity, _)| *similarity == f32::INFINITY)
                .map(|(_, rating)| (1.0, *rating));
            weighted_average(exact_matches, self.data.criteria_size())
        } else {
            let top_similarity = neighbours[0].0;
            let k = match self.k {
                0 => neighbours.len(),
                k => neighbours.len().min(k as usize),
            };
            let nearest = neighbours[..k]
                .iter()
                .map(|(similarity, rating)| (similarity / top_similarity, *rating));
            weighted_average(nearest, self.data.criteria_size())
        };

        for (score, precision) in scores.iter_mut().zip(self.data.precision()) {
            assert!(!score.is_nan(), "NaN prediction for user {} and item {}", user, item);
            if *precision == Precision::Int {
                *score = score.round();
            }
        }
        prediction.scores = scores;
    }

    fn similarity_between(&self, user_1: u32, user_2: u32, cache: &mut SimilarityCache) -> f32 {
        let key = (user_1.min(user_2), user_1.max(user_2));
        *cache.entry(key).or_insert_with(|| {
            let (scores_1, scores_2) =
                self.data.get_scores_from_common_ratings_by_users(key.0, key.1);
            self.similarity.compute(&scores_1, &scores_2, true)
        })
    }
}

fn weighted_average<'a>(
    neighbours: impl Iterator<Item = (f32, &'a Rating)>,
    criteria_size: usize,
) -> Vec<f32> {
    let mut scores = vec![0.0; criteria_size];
    let mut weight_sum = 0.0;
    for (weight, rating) in neighbours {
        weight_sum += weight;
        for (score, neighbour_score) in scores.iter_mut().zip(&rating.scores) {
            *score += weight * neighbour_score;
        }
    }
    for score in scores.iter_mut() {
        *score /= weight_sum;
    }
    scores
}

impl Model for NeighboursModel {
    /// Memorizes the training set. The training error is zero by convention.
    #[instrument(level = "info", skip_all, fields(k = self.k, similarity = %self.similarity))]
    fn train(
        &mut self,
        train_set: &Dataset,
        valid_set: &Dataset,
        _rng: &mut dyn RngCore,
    ) -> Result<f32> {
        self.data = train_set.clone();
        let valid_error = if valid_set.is_empty() {
            0.0
        } else {
            self.test(valid_set)
        };
        info!(train_error = 0.0, valid_error, "trained");
        Ok(valid_error)
    }

    fn test_batch(&self, ratings: &mut [Rating]) {
        let mut cache = SimilarityCache::default();
        for rating in ratings.iter_mut() {
            self.predict(rating, &mut cache);
        }
    }

    fn load(&mut self, path: &Path) -> Result {
        *self = Self::from_config(read_message(path)?)
            .with_context(|| format!("failed to load the neighbours model from `{:?}`", path))?;
        Ok(())
    }

    fn save(&self, path: &Path, format: Format) -> Result {
        write_message(path, &self.to_config(), format)
    }

    fn info(&self) -> String {
        let mut info = String::new();
        let _ = writeln!(info, "K = {}", self.k);
        let _ = writeln!(info, "Similarity = {}", self.similarity);
        info + &self.data.summary()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::dataset::tests::sample;

    fn trained(dataset: &Dataset, k: u32, similarity: Similarity) -> NeighboursModel {
        let mut model = NeighboursModel::new(k, similarity);
        model
            .train(dataset, &Dataset::default(), &mut StdRng::seed_from_u64(0))
            .unwrap();
        model
    }

    fn predict(model: &NeighboursModel, user: u32, item: u32, criteria_size: usize) -> Vec<f32> {
        let mut ratings = [Rating::zeros(user, item, criteria_size)];
        model.test_batch(&mut ratings);
        ratings[0].scores.clone()
    }

    #[test]
    fn self_match_ok() {
        let dataset = Dataset::from_ratings(vec![Rating::new(0, 0, vec![5.0])]);
        for k in [0, 1, 10] {
            let model = trained(&dataset, k, Similarity::Cosine);
            assert_eq!(predict(&model, 0, 0, 1), vec![5.0]);
        }
    }

    #[test]
    fn cold_item_falls_back_to_midpoint_ok() {
        let dataset = Dataset::from_ratings(vec![
            Rating::new(0, 0, vec![1.0, 2.0]),
            Rating::new(1, 1, vec![5.0, 4.0]),
        ]);
        let model = trained(&dataset, 0, Similarity::Cosine);
        assert_eq!(predict(&model, 7, 99, 2), vec![3.0, 3.0]);
    }

    #[test]
    fn no_similar_users_leaves_prediction_ok() {
        // User 2 shares no items with user 0.
        let dataset = Dataset::from_ratings(vec![
            Rating::new(0, 0, vec![4.0]),
            Rating::new(2, 1, vec![2.0]),
        ]);
        let model = trained(&dataset, 0, Similarity::Cosine);
        assert_eq!(predict(&model, 2, 0, 1), vec![0.0]);
    }

    #[test]
    fn weighted_average_ok() {
        let dataset = sample();
        let model = trained(&dataset, 0, Similarity::Cosine);

        // User 3 only rated item 1, so the cosine over one 2-criteria rating drives the weights.
        let similarity_0 = Similarity::Cosine.compute(&[5.0, 5.0], &[3.0, 3.0], true);
        let similarity_1 = Similarity::Cosine.compute(&[5.0, 5.0], &[4.0, 2.0], true);
        let top = similarity_0.max(similarity_1);
        let (w0, w1) = (similarity_0 / top, similarity_1 / top);
        let expected = [
            (w0 * 1.0 + w1 * 3.0) / (w0 + w1),
            (w0 * 2.0 + w1 * 4.0) / (w0 + w1),
        ];

        let prediction = predict(&model, 3, 0, 2);
        assert!((prediction[0] - expected[0]).abs() < 1e-5);
        assert!((prediction[1] - expected[1]).abs() < 1e-5);
    }

    #[test]
    fn top_k_takes_nearest_ok() {
        let dataset = sample();
        let model = trained(&dataset, 1, Similarity::Cosine);
        // User 0 is the nearest to user 3 among the raters of item 0.
        assert_eq!(predict(&model, 3, 0, 2), vec![1.0, 2.0]);
    }

    #[test]
    fn exact_matches_are_averaged_ok() {
        let dataset = Dataset::from_ratings(vec![
            Rating::new(0, 0, vec![2.0]),
            Rating::new(1, 0, vec![2.0]),
            Rating::new(2, 0, vec![3.0]),
            Rating::new(0, 1, vec![4.0]),
            Rating::new(1, 1, vec![4.0]),
            Rating::new(2, 1, vec![1.0]),
            Rating::new(3, 0, vec![2.0]),
            Rating::new(3, 1, vec![4.0]),
            Rating::new(1, 2, vec![5.0]),
            Rating::new(2, 2, vec![1.0]),
            Rating::new(0, 2, vec![3.0]),
        ]);
        let model = trained(&dataset, 1, Similarity::Norm1);
        // Users 0 and 1 match user 3 exactly on item 0; user 2 is finite and ignored.
        assert_eq!(predict(&model, 3, 2, 1), vec![4.0]);
    }

    #[test]
    fn integer_criteria_are_rounded_ok() {
        let dataset = sample().with_precision(vec![Precision::Int, Precision::Int]);
        let model = trained(&dataset, 0, Similarity::Cosine);
        let prediction = predict(&model, 3, 0, 2);
        assert!(prediction.iter().all(|score| score.fract() == 0.0));
    }

    #[test]
    fn training_set_error_is_zero_ok() {
        let dataset = sample();
        let model = trained(&dataset, 0, Similarity::Cosine);
        assert_eq!(model.test(&dataset), 0.0);
    }

    #[test]
    fn train_reports_validation_error_ok() -> crate::Result {
        let mut model = NeighboursModel::new(0, Similarity::Cosine);
        let valid_set = Dataset::from_ratings(vec![Rating::new(3, 0, vec![5.0, 5.0])])
            .with_bounds(vec![1.0, 1.0], vec![5.0, 5.0]);
        let error = model.train(&sample(), &valid_set, &mut StdRng::seed_from_u64(0))?;
        assert!(error > 0.0);
        assert_eq!(error, model.test(&valid_set));
        Ok(())
    }

    #[test]
    fn config_round_trip_ok() -> crate::Result {
        let model = trained(&sample(), 3, Similarity::NormInf);
        let restored = NeighboursModel::from_config(model.to_config())?;
        assert_eq!(restored.k, 3);
        assert_eq!(restored.similarity, Similarity::NormInf);
        assert_eq!(restored.data.ratings(), model.data.ratings());
        assert_eq!(predict(&restored, 3, 0, 2), predict(&model, 3, 0, 2));
        Ok(())
    }

    #[test]
    fn invalid_similarity_fails() {
        let config = NeighboursModelConfig {
            similarity: 42,
            ..Default::default()
        };
        assert!(NeighboursModel::from_config(config).is_err());
    }
}
