use std::fmt::{Display, Formatter};

/// User's multi-criteria rating of an item.
#[derive(Clone, Debug, PartialEq)]
pub struct Rating {
    user: u32,
    item: u32,

    /// One score per criterion.
    pub scores: Vec<f32>,
}

impl Rating {
    pub fn new(user: u32, item: u32, scores: Vec<f32>) -> Self {
        Self { user, item, scores }
    }

    /// Zero-scored rating, used as a prediction placeholder.
    #[cfg(test)]
    pub fn zeros(user: u32, item: u32, criteria_size: usize) -> Self {
        Self::new(user, item, vec![0.0; criteria_size])
    }

    #[must_use]
    #[inline]
    pub const fn user(&self) -> u32 {
        self.user
    }

    #[must_use]
    #[inline]
    pub const fn item(&self) -> u32 {
        self.item
    }
}

impl Display for Rating {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} {}", self.user, self.item)?;
        for score in &self.scores {
            write!(formatter, " {}", score)?;
        }
        Ok(())
    }
}
