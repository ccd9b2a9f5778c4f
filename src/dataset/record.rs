use std::fmt::Debug;
use std::path::Path;

use crate::dataset::{scan_bounds, scan_shape, Dataset, Precision, Rating, MAX_ENTITIES};
use crate::persistence::{read_message, write_message, Format};
use crate::prelude::*;
use crate::protos;

impl Dataset {
    #[instrument(level = "info", skip_all, fields(path = ?path))]
    pub fn load(path: impl AsRef<Path> + Debug) -> Result<Self> {
        let start_instant = Instant::now();
        let dataset = Self::from_record(read_message(&path)?)?;
        info!(
            n_ratings = dataset.len(),
            n_users = dataset.users(),
            n_items = dataset.items(),
            criteria_size = dataset.criteria_size(),
            elapsed = ?start_instant.elapsed(),
            "loaded",
        );
        Ok(dataset)
    }

    #[instrument(level = "info", skip(self), fields(n_ratings = self.len()))]
    pub fn save(&self, path: impl AsRef<Path> + Debug, format: Format) -> Result {
        write_message(path, &self.to_record(), format)
    }

    /// Validates the record and builds the indices.
    ///
    /// Older records may miss some metadata: the criteria size is then taken from the first
    /// rating, the bounds are recomputed when they don't match the criteria size, a single
    /// precision applies to all the criteria, and no precision means float.
    pub fn from_record(record: protos::Ratings) -> Result<Self> {
        let criteria_size = match record.criteria_size {
            0 => record.ratings.first().map_or(0, |rating| rating.scores.len()),
            criteria_size => criteria_size as usize,
        };

        let ratings = record
            .ratings
            .into_iter()
            .enumerate()
            .map(|(i, rating)| {
                if rating.user >= MAX_ENTITIES {
                    bail!("rating #{}: user id {} is out of range", i, rating.user);
                }
                if rating.item >= MAX_ENTITIES {
                    bail!("rating #{}: item id {} is out of range", i, rating.item);
                }
                if rating.scores.len() != criteria_size {
                    bail!(
                        "rating #{} has {} scores, expected {}",
                        i,
                        rating.scores.len(),
                        criteria_size,
                    );
                }
                Ok(Rating::new(rating.user, rating.item, rating.scores))
            })
            .collect::<Result<Vec<_>>>()?;

        let (minv, maxv) =
            if record.minv.len() == criteria_size && record.maxv.len() == criteria_size {
                (record.minv, record.maxv)
            } else {
                debug!("scanning the ratings for the score bounds");
                scan_bounds(&ratings, criteria_size)
            };

        let precision = record
            .precision
            .iter()
            .map(|value| {
                Precision::from_i32(*value).ok_or_else(|| anyhow!("invalid precision `{}`", value))
            })
            .collect::<Result<Vec<_>>>()?;
        let precision = match precision.len() {
            0 => vec![Precision::Float; criteria_size],
            1 => vec![precision[0]; criteria_size],
            n if n == criteria_size => precision,
            n => bail!("expected {} precision values, got {}", criteria_size, n),
        };

        if record.num_users > MAX_ENTITIES || record.num_items > MAX_ENTITIES {
            bail!(
                "declared shape {}×{} exceeds the limit of {}",
                record.num_users,
                record.num_items,
                MAX_ENTITIES,
            );
        }
        let (num_users, num_items) = scan_shape(&ratings);
        let mut dataset = Self {
            ratings,
            criteria_size,
            minv,
            maxv,
            precision,
            num_users: num_users.max(record.num_users),
            num_items: num_items.max(record.num_items),
            by_user: Vec::new(),
            by_item: Vec::new(),
        };
        dataset.prepare_aux();
        Ok(dataset)
    }

    #[must_use]
    pub fn to_record(&self) -> protos::Ratings {
        protos::Ratings {
            ratings: self
                .ratings
                .iter()
                .map(|rating| protos::Rating {
                    user: rating.user(),
                    item: rating.item(),
                    scores: rating.scores.clone(),
                })
                .collect(),
            criteria_size: self.criteria_size as u32,
            num_users: self.num_users,
            num_items: self.num_items,
            minv: self.minv.clone(),
            maxv: self.maxv.clone(),
            precision: self.precision.iter().map(|precision| *precision as i32).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::sample;

    fn record(scores: &[&[f32]]) -> protos::Ratings {
        protos::Ratings {
            ratings: scores
                .iter()
                .enumerate()
                .map(|(i, scores)| protos::Rating {
                    user: i as u32,
                    item: 2 * i as u32,
                    scores: scores.to_vec(),
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn record_round_trip_ok() -> crate::Result {
        let dataset = sample().with_precision(vec![Precision::Int, Precision::Float]);
        let restored = Dataset::from_record(dataset.to_record())?;
        assert_eq!(restored.ratings(), dataset.ratings());
        assert_eq!(restored.minv(), dataset.minv());
        assert_eq!(restored.maxv(), dataset.maxv());
        assert_eq!(restored.precision(), dataset.precision());
        assert_eq!(restored.users(), dataset.users());
        assert_eq!(restored.items(), dataset.items());
        Ok(())
    }

    #[test]
    fn missing_metadata_is_inferred_ok() -> crate::Result {
        let dataset = Dataset::from_record(record(&[&[1.0, 7.0], &[3.0, 2.0]]))?;
        assert_eq!(dataset.criteria_size(), 2);
        assert_eq!(dataset.minv(), &[1.0, 2.0]);
        assert_eq!(dataset.maxv(), &[3.0, 7.0]);
        assert_eq!(dataset.precision(), &[Precision::Float, Precision::Float]);
        assert_eq!(dataset.users(), 2);
        assert_eq!(dataset.items(), 3);
        Ok(())
    }

    #[test]
    fn single_precision_is_broadcast_ok() -> crate::Result {
        let mut record = record(&[&[1.0, 2.0, 3.0]]);
        record.precision = vec![Precision::Int as i32];
        let dataset = Dataset::from_record(record)?;
        assert_eq!(dataset.precision(), &[Precision::Int; 3]);
        Ok(())
    }

    #[test]
    fn declared_shape_is_kept_ok() -> crate::Result {
        let mut record = record(&[&[1.0]]);
        record.num_users = 10;
        record.num_items = 20;
        let dataset = Dataset::from_record(record)?;
        assert_eq!(dataset.users(), 10);
        assert_eq!(dataset.items(), 20);
        Ok(())
    }

    #[test]
    fn inconsistent_scores_fail() {
        let mut record = record(&[&[1.0, 2.0], &[3.0]]);
        record.criteria_size = 2;
        assert!(Dataset::from_record(record).is_err());
    }

    #[test]
    fn out_of_range_ids_fail() {
        let mut record = record(&[&[1.0]]);
        record.ratings[0].user = u32::MAX;
        assert!(Dataset::from_record(record.clone()).is_err());
        record.ratings[0].user = 0;
        record.ratings[0].item = u32::MAX;
        assert!(Dataset::from_record(record.clone()).is_err());
        record.ratings[0].item = MAX_ENTITIES;
        assert!(Dataset::from_record(record).is_err());
    }

    #[test]
    fn oversized_declared_shape_fails() {
        let mut record = record(&[&[1.0]]);
        record.num_users = u32::MAX;
        assert!(Dataset::from_record(record.clone()).is_err());
        record.num_users = 0;
        record.num_items = MAX_ENTITIES + 1;
        assert!(Dataset::from_record(record).is_err());
    }

    #[test]
    fn invalid_precision_fails() {
        let mut record = record(&[&[1.0]]);
        record.precision = vec![42];
        assert!(Dataset::from_record(record).is_err());
    }

    #[test]
    fn file_round_trip_ok() -> crate::Result {
        let dataset = sample();
        for format in [Format::Binary, Format::Text] {
            let path = std::env::temp_dir()
                .join(format!("mcfs-dataset-{}-{:?}.pb", std::process::id(), format));
            dataset.save(&path, format)?;
            let restored = Dataset::load(&path)?;
            std::fs::remove_file(&path)?;
            assert_eq!(restored.ratings(), dataset.ratings());
        }
        Ok(())
    }
}
