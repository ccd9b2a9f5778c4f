/// Root-mean-square error accumulator.
#[derive(Default)]
pub struct Error {
    error: f64,
    count: usize,
}

impl Error {
    #[inline]
    pub fn push(&mut self, residual_error: f32) {
        let residual_error = residual_error as f64;
        self.error += residual_error * residual_error;
        self.count += 1;
    }

    #[must_use]
    pub fn average(&self) -> f32 {
        (self.error / self.count.max(1) as f64).sqrt() as f32
    }
}
