#[must_use]
pub fn norm(x: &[f32]) -> f32 {
    squared_norm(x).sqrt()
}

#[must_use]
pub fn squared_norm(x: &[f32]) -> f32 {
    x.iter().map(|xi| xi * xi).sum()
}

#[must_use]
#[inline]
pub fn dot(x: &[f32], y: &[f32]) -> f32 {
    x.iter().zip(y).fold(0.0, |dot, (xi, yi)| dot + xi * yi)
}

/// `y += alpha * x`
#[inline]
pub fn axpy(alpha: f32, x: &[f32], y: &mut [f32]) {
    debug_assert_eq!(x.len(), y.len());
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

pub fn scale(alpha: f32, x: &mut [f32]) {
    for xi in x.iter_mut() {
        *xi *= alpha;
    }
}

/// Divides the vector by its Euclidean norm.
/// A zero vector is left as is.
#[must_use]
pub fn normalized(x: &[f32]) -> Vec<f32> {
    let mut x = x.to_vec();
    let norm = norm(&x);
    if norm > 0.0 {
        scale(1.0 / norm, &mut x);
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dot_ok() {
        assert!((dot(&[1.0, 2.0, 3.0], &[3.0, 5.0, 7.0]) - 34.0).abs() < f32::EPSILON);
    }

    #[test]
    fn axpy_ok() {
        let mut y = [1.0, 1.0];
        axpy(2.0, &[1.0, -1.0], &mut y);
        assert_eq!(y, [3.0, -1.0]);
    }

    #[test]
    fn normalized_ok() {
        let x = normalized(&[3.0, 4.0]);
        assert!((x[0] - 0.6).abs() < 1e-6);
        assert!((x[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalized(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
