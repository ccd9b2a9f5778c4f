//! Pairwise similarity of equal-length score vectors.

use std::fmt::{Display, Formatter};

use clap::ValueEnum;

use crate::math::vector::{dot, norm, normalized};

/// Closed set of the supported similarity functions.
///
/// The norm-based similarities are inverted distances and return `+∞` for identical
/// vectors, which the neighbours model treats as an exact match.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration, ValueEnum,
)]
#[repr(i32)]
pub enum Similarity {
    Cosine = 0,
    CosineSqrt = 1,
    CosinePow2 = 2,
    Norm1 = 3,
    Norm2 = 4,
    NormInf = 5,
}

impl Similarity {
    /// # Panics
    ///
    /// The vectors must have equal lengths. The norm-based similarities never return NaN.
    #[must_use]
    pub fn compute(self, a: &[f32], b: &[f32], normalize: bool) -> f32 {
        assert_eq!(a.len(), b.len(), "similarity of vectors with different lengths");
        match self {
            Self::Cosine => cosine(a, b, normalize),
            Self::CosineSqrt => cosine(a, b, normalize).sqrt(),
            Self::CosinePow2 => cosine(a, b, normalize).powi(2),
            Self::Norm1 => inverse_distance(a, b, normalize, |a, b| minkowski(a, b, 1.0)),
            Self::Norm2 => inverse_distance(a, b, normalize, |a, b| minkowski(a, b, 2.0)),
            Self::NormInf => inverse_distance(a, b, normalize, chebyshev),
        }
    }

    #[cfg(test)]
    pub const fn is_norm(self) -> bool {
        matches!(self, Self::Norm1 | Self::Norm2 | Self::NormInf)
    }
}

impl Display for Similarity {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(match self {
            Self::Cosine => "COSINE",
            Self::CosineSqrt => "COSINE_SQRT",
            Self::CosinePow2 => "COSINE_POW2",
            Self::Norm1 => "NORM1",
            Self::Norm2 => "NORM2",
            Self::NormInf => "NORMINF",
        })
    }
}

fn cosine(a: &[f32], b: &[f32], normalize: bool) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let dot = dot(a, b);
    if normalize {
        dot / (norm(a) * norm(b))
    } else {
        dot
    }
}

fn inverse_distance(
    a: &[f32],
    b: &[f32],
    normalize: bool,
    distance: impl Fn(&[f32], &[f32]) -> f32,
) -> f32 {
    if a.is_empty() {
        return 0.0;
    }
    let distance = if normalize {
        distance(&normalized(a), &normalized(b))
    } else {
        distance(a, b)
    };
    let similarity = if distance > 0.0 {
        1.0 / distance
    } else {
        f32::INFINITY
    };
    assert!(!similarity.is_nan(), "NaN similarity");
    similarity
}

fn minkowski(a: &[f32], b: &[f32], p: f32) -> f32 {
    a.iter()
        .zip(b)
        .map(|(ai, bi)| (ai - bi).abs().powf(p))
        .sum::<f32>()
        .powf(1.0 / p)
}

fn chebyshev(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(ai, bi)| (ai - bi).abs())
        .fold(0.0, f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Similarity; 6] = [
        Similarity::Cosine,
        Similarity::CosineSqrt,
        Similarity::CosinePow2,
        Similarity::Norm1,
        Similarity::Norm2,
        Similarity::NormInf,
    ];

    #[test]
    fn cosine_ok() {
        let similarity = Similarity::Cosine.compute(&[1.0, 2.0, 3.0], &[3.0, 5.0, 7.0], true);
        assert!((similarity - 0.9974149).abs() < 1e-6);
        assert!((Similarity::Cosine.compute(&[1.0, 2.0], &[3.0, 4.0], false) - 11.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_family_ok() {
        let (a, b) = ([1.0, 0.0], [1.0, 1.0]);
        let cosine = Similarity::Cosine.compute(&a, &b, true);
        assert!((Similarity::CosineSqrt.compute(&a, &b, true) - cosine.sqrt()).abs() < 1e-6);
        assert!((Similarity::CosinePow2.compute(&a, &b, true) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_is_zero_ok() {
        for similarity in ALL {
            assert_eq!(similarity.compute(&[], &[], true), 0.0);
        }
    }

    #[test]
    fn norm_self_similarity_is_infinite_ok() {
        let v = [1.0, 4.0, 2.5];
        for similarity in ALL.into_iter().filter(|similarity| similarity.is_norm()) {
            assert_eq!(similarity.compute(&v, &v, true), f32::INFINITY);
            assert_eq!(similarity.compute(&v, &v, false), f32::INFINITY);
        }
    }

    #[test]
    fn norm_distances_ok() {
        let (a, b) = ([0.0, 0.0], [3.0, 4.0]);
        assert!((Similarity::Norm1.compute(&a, &b, false) - 1.0 / 7.0).abs() < 1e-6);
        assert!((Similarity::Norm2.compute(&a, &b, false) - 1.0 / 5.0).abs() < 1e-6);
        assert!((Similarity::NormInf.compute(&a, &b, false) - 1.0 / 4.0).abs() < 1e-6);
    }

    #[test]
    fn normalized_parallel_vectors_match_exactly_ok() {
        let similarity = Similarity::Norm2.compute(&[1.0, 2.0], &[2.0, 4.0], true);
        assert!(similarity > 1e5);
    }

    #[test]
    fn symmetry_ok() {
        let (a, b) = ([1.0, 3.0, 2.0, 5.0], [2.0, 1.0, 4.0, 4.0]);
        for similarity in ALL {
            for normalize in [false, true] {
                assert_eq!(
                    similarity.compute(&a, &b, normalize),
                    similarity.compute(&b, &a, normalize),
                );
            }
        }
    }

    #[test]
    #[should_panic]
    fn length_mismatch_panics() {
        let _ = Similarity::Cosine.compute(&[1.0], &[1.0, 2.0], true);
    }
}
