use rand::Rng;
use statrs::distribution::Normal;

use crate::math::vector::{axpy, squared_norm};
use crate::model::pmf::MatrixInit;
use crate::prelude::*;

/// Dense `[criteria][rows][factors]` tensor, flattened criterion-major and row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    n_rows: usize,
    n_factors: usize,
    buffer: Vec<f32>,
}

impl Tensor {
    #[must_use]
    pub fn zeros(n_criteria: usize, n_rows: usize, n_factors: usize) -> Self {
        Self {
            n_rows,
            n_factors,
            buffer: vec![0.0; n_criteria * n_rows * n_factors],
        }
    }

    pub fn from_buffer(
        n_criteria: usize,
        n_rows: usize,
        n_factors: usize,
        buffer: Vec<f32>,
    ) -> Result<Self> {
        let expected_len = n_criteria * n_rows * n_factors;
        if buffer.len() != expected_len {
            bail!(
                "expected {} values for {}×{}×{}, got {}",
                expected_len,
                n_criteria,
                n_rows,
                n_factors,
                buffer.len(),
            );
        }
        Ok(Self {
            n_rows,
            n_factors,
            buffer,
        })
    }

    pub fn init<R: Rng + ?Sized>(
        init: MatrixInit,
        n_criteria: usize,
        n_rows: usize,
        n_factors: usize,
        rng: &mut R,
    ) -> Result<Self> {
        let mut this = Self::zeros(n_criteria, n_rows, n_factors);
        let len = this.buffer.len();
        match init {
            MatrixInit::Static => {
                for (i, value) in this.buffer.iter_mut().enumerate() {
                    *value = (i + 1) as f32 / len as f32;
                }
            }
            MatrixInit::Normal => {
                let normal = Normal::new(0.0, 1.0)?;
                for value in this.buffer.iter_mut() {
                    *value = rng.sample(&normal) as f32;
                }
            }
            MatrixInit::Uniform => {
                for value in this.buffer.iter_mut() {
                    *value = rng.gen_range(0.0..1.0);
                }
            }
        }
        Ok(this)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.buffer
    }

    #[must_use]
    #[inline]
    pub fn row(&self, criterion: usize, row: usize) -> &[f32] {
        let start = self.offset(criterion, row);
        &self.buffer[start..start + self.n_factors]
    }

    #[inline]
    pub fn row_mut(&mut self, criterion: usize, row: usize) -> &mut [f32] {
        let start = self.offset(criterion, row);
        &mut self.buffer[start..start + self.n_factors]
    }

    /// Squared Frobenius norm.
    #[must_use]
    pub fn squared_norm(&self) -> f32 {
        squared_norm(&self.buffer)
    }

    /// `self += alpha * other`
    pub fn add_scaled(&mut self, alpha: f32, other: &Self) {
        assert_eq!(self.buffer.len(), other.buffer.len(), "tensor shape mismatch");
        axpy(alpha, &other.buffer, &mut self.buffer);
    }

    #[inline]
    const fn offset(&self, criterion: usize, row: usize) -> usize {
        (criterion * self.n_rows + row) * self.n_factors
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    #[test]
    fn rows_are_criterion_major_ok() -> crate::Result {
        let tensor = Tensor::from_buffer(2, 3, 2, (0..12).map(|i| i as f32).collect())?;
        assert_eq!(tensor.row(0, 0), &[0.0, 1.0]);
        assert_eq!(tensor.row(0, 2), &[4.0, 5.0]);
        assert_eq!(tensor.row(1, 0), &[6.0, 7.0]);
        assert_eq!(tensor.row(1, 2), &[10.0, 11.0]);
        Ok(())
    }

    #[test]
    fn wrong_buffer_length_fails() {
        assert!(Tensor::from_buffer(1, 2, 3, vec![0.0; 5]).is_err());
    }

    #[test]
    fn static_init_is_a_ramp_ok() -> crate::Result {
        let tensor = Tensor::init(MatrixInit::Static, 1, 2, 2, &mut StdRng::seed_from_u64(0))?;
        assert_eq!(tensor.as_slice(), &[0.25, 0.5, 0.75, 1.0]);
        Ok(())
    }

    #[test]
    fn uniform_init_is_within_range_ok() -> crate::Result {
        let tensor = Tensor::init(MatrixInit::Uniform, 2, 5, 3, &mut StdRng::seed_from_u64(0))?;
        assert_eq!(tensor.len(), 30);
        assert!(tensor.as_slice().iter().all(|value| (0.0..1.0).contains(value)));
        Ok(())
    }

    #[test]
    fn normal_init_is_seeded_ok() -> crate::Result {
        let tensor_1 = Tensor::init(MatrixInit::Normal, 1, 4, 4, &mut StdRng::seed_from_u64(42))?;
        let tensor_2 = Tensor::init(MatrixInit::Normal, 1, 4, 4, &mut StdRng::seed_from_u64(42))?;
        assert_eq!(tensor_1, tensor_2);
        assert!(tensor_1.as_slice().iter().all(|value| value.is_finite()));
        Ok(())
    }

    #[test]
    fn add_scaled_ok() {
        let mut tensor = Tensor::zeros(1, 1, 2);
        let mut other = Tensor::zeros(1, 1, 2);
        other.row_mut(0, 0).copy_from_slice(&[1.0, -2.0]);
        tensor.add_scaled(0.5, &other);
        assert_eq!(tensor.row(0, 0), &[0.5, -1.0]);
        assert!((tensor.squared_norm() - 1.25).abs() < 1e-6);
    }
}
