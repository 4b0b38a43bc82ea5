//! Core vector data structure.

use serde::{Deserialize, Serialize};

use crate::error::{Result, XiphosError};

/// A dense, fixed-length vector of `f64` components.
///
/// Vectors are read-only once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vector {
    data: Vec<f64>,
}

impl Vector {
    /// Create a new vector from its components.
    pub fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    /// Borrow the components.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Take the components back.
    pub fn into_inner(self) -> Vec<f64> {
        self.data
    }

    /// Get the dimensionality of this vector.
    pub fn dimension(&self) -> usize {
        self.data.len()
    }

    /// Whether the vector has no components.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Calculate the L2 norm (magnitude) of this vector.
    pub fn norm(&self) -> f64 {
        self.data.iter().map(|x| x * x).sum::<f64>().sqrt()
    }

    /// Validate that this vector has the expected dimension.
    pub fn validate_dimension(&self, expected_dim: usize) -> Result<()> {
        if self.data.len() != expected_dim {
            return Err(XiphosError::incompatible_lengths(
                expected_dim,
                self.data.len(),
            ));
        }
        Ok(())
    }

    /// Check that no component is NaN or infinite.
    pub fn is_valid(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

impl From<Vec<f64>> for Vector {
    fn from(data: Vec<f64>) -> Self {
        Self::new(data)
    }
}

impl AsRef<[f64]> for Vector {
    fn as_ref(&self) -> &[f64] {
        &self.data
    }
}
