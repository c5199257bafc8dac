//! Hypervector type and its algebra: bind, permute, bundle, cosine.

use serde::{Deserialize, Serialize};

/// A fixed-dimensional hyperdimensional vector of bipolar-leaning reals.
///
/// Values are dense `f32` rather than strict `{-1, +1}` bipolar: bundling
/// (superposition) and the projection step both produce intermediate
/// magnitudes, and collapsing to strict bipolar on every operation would
/// throw away the information the concept-memory running mean relies on.
/// `bind` and `permute` are still defined the classic HDC way (involutive,
/// order-encoding) over this dense representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypervector {
    dim: usize,
    values: Vec<f32>,
}

impl Hypervector {
    /// Create a zero vector of the given dimension.
    #[must_use]
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            values: vec![0.0; dim],
        }
    }

    /// Wrap a raw value buffer. Panics if empty; callers always construct
    /// from a known-nonzero dimension (the encoder, the projection matrix).
    #[must_use]
    pub fn from_values(values: Vec<f32>) -> Self {
        let dim = values.len();
        assert!(dim > 0, "hypervector dimension must be non-zero");
        Self { dim, values }
    }

    #[must_use]
    pub const fn dim(&self) -> usize {
        self.dim
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<f32> {
        self.values
    }

    /// L2 norm.
    #[must_use]
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Normalise to unit L2 norm. A zero vector is left unchanged (there is
    /// no meaningful direction to normalise it to).
    #[must_use]
    pub fn normalised(mut self) -> Self {
        let norm = self.norm();
        if norm > f32::EPSILON {
            for v in &mut self.values {
                *v /= norm;
            }
        }
        self
    }

    /// Element-wise binding. Involutive: `a.bind(&b).bind(&b) == a`.
    ///
    /// # Panics
    /// Panics if dimensions differ.
    #[must_use]
    pub fn bind(&self, other: &Self) -> Self {
        assert_eq!(self.dim, other.dim, "hypervector dimension mismatch");
        let values = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .collect();
        Self {
            dim: self.dim,
            values,
        }
    }

    /// Cyclic permutation by `shift` positions (positive = rightward).
    #[must_use]
    pub fn permute(&self, shift: i64) -> Self {
        let dim = self.dim;
        if dim == 0 {
            return self.clone();
        }
        let shift = shift.rem_euclid(dim as i64) as usize;
        let mut values = vec![0.0; dim];
        for (i, v) in self.values.iter().enumerate() {
            values[(i + shift) % dim] = *v;
        }
        Self { dim, values }
    }

    /// Bundle (superpose) many vectors of equal dimension by element-wise
    /// sum, then normalise. Returns a zero vector for an empty slice.
    ///
    /// # Panics
    /// Panics if any element has a dimension differing from the first.
    #[must_use]
    pub fn bundle(vectors: &[Self]) -> Self {
        let Some(first) = vectors.first() else {
            return Self::zeros(1);
        };
        let dim = first.dim;
        let mut acc = vec![0.0f32; dim];
        for v in vectors {
            assert_eq!(v.dim, dim, "hypervector dimension mismatch in bundle");
            for (a, b) in acc.iter_mut().zip(v.values.iter()) {
                *a += b;
            }
        }
        Self { dim, values: acc }.normalised()
    }

    /// Cosine similarity in `[-1, 1]`. Two zero vectors are defined as
    /// similarity `0.0` (no directional information in either).
    ///
    /// # Panics
    /// Panics if dimensions differ.
    #[must_use]
    pub fn cosine(&self, other: &Self) -> f32 {
        assert_eq!(self.dim, other.dim, "hypervector dimension mismatch");
        let dot: f32 = self
            .values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| a * b)
            .sum();
        let denom = self.norm() * other.norm();
        if denom < f32::EPSILON {
            0.0
        } else {
            (dot / denom).clamp(-1.0, 1.0)
        }
    }
}
