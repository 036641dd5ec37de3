use crate::domain::errors::{DomainError, Result};

/// Side length of the square tile grid (n x n tiles)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridArity(u8);

impl GridArity {
    pub const MAX: u8 = 10;

    pub fn new(side: u8) -> Result<Self> {
        if side == 0 || side > Self::MAX {
            return Err(DomainError::InvalidGridArity(side));
        }
        Ok(Self(side))
    }

    pub fn side(&self) -> u8 {
        self.0
    }

    /// Maximum number of tiles rendered
    pub fn capacity(&self) -> usize {
        usize::from(self.0) * usize::from(self.0)
    }
}

impl Default for GridArity {
    fn default() -> Self {
        Self(8)
    }
}
