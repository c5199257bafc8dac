//! Text → feature vector → hypervector encoding.
//!
//! No external embedding model is involved (see `DESIGN.md`): the encoder
//! is a pure, deterministic function of its input text, built from n-gram
//! hashing, a small keyword boost vocabulary, and a fixed pseudo-random
//! projection matrix generated once at construction time.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use super::hypervector::Hypervector;

/// Dimension of the intermediate n-gram accumulator, before projection
/// into hyperdimensional space. Kept smaller than the hyperdimensional
/// space itself; the projection matrix is what does the "lifting".
const FEATURE_DIM: usize = 1024;

/// Fixed seed for the projection matrix. Encoding determinism (§8 property
/// 1) depends on this never changing at runtime and never being derived
/// from wall-clock time.
const PROJECTION_SEED: u64 = 0x4841_4E44_5F48_4443; // "HAND_HDC" in hex-ish

/// Programming-domain keyword vocabulary that gets an extra boost in the
/// feature accumulator, so texts that share programming vocabulary are
/// pulled closer together even when their n-grams otherwise diverge.
const KEYWORD_VOCAB: &[&str] = &[
    "function", "return", "loop", "array", "list", "dict", "map", "set",
    "string", "integer", "float", "boolean", "class", "object", "recursion",
    "recursive", "iterate", "sort", "search", "graph", "tree", "node",
    "stack", "queue", "hash", "pointer", "index", "input", "output",
    "print", "read", "write", "parse", "compile", "exception", "error",
    "test", "assert", "variable", "parameter", "argument", "algorithm",
    "complexity", "matrix", "vector", "sum", "product", "maximum",
    "minimum", "reverse", "duplicate", "substring", "palindrome",
    "fibonacci", "factorial", "prime", "knapsack", "dynamic", "greedy",
];

/// Deterministic text → hypervector encoder.
#[derive(Debug, Clone)]
pub struct Encoder {
    feature_dim: usize,
    hv_dim: usize,
    /// `hv_dim x feature_dim` projection matrix, row-major.
    projection: Vec<f32>,
}

impl Encoder {
    /// Build an encoder projecting into a hypervector space of `hv_dim`
    /// dimensions. The projection matrix is derived deterministically from
    /// [`PROJECTION_SEED`] so two encoders built with the same `hv_dim`
    /// always agree.
    #[must_use]
    pub fn new(hv_dim: usize) -> Self {
        let mut rng = ChaCha20Rng::seed_from_u64(PROJECTION_SEED ^ hv_dim as u64);
        let projection = (0..hv_dim * FEATURE_DIM)
            .map(|_| rng.random_range(-1.0f32..=1.0f32))
            .collect();
        Self {
            feature_dim: FEATURE_DIM,
            hv_dim,
            projection,
        }
    }

    /// Encode `text` into a hypervector. Deterministic: equal text yields
    /// bit-identical output.
    #[must_use]
    pub fn encode(&self, text: &str) -> Hypervector {
        let features = self.accumulate_features(text);
        self.project(&features)
    }

    /// Lowercase, extract 2-grams and 3-grams over characters, hash each,
    /// and accumulate into a fixed-size feature buffer with a sign bit
    /// derived from the hash itself (so the same n-gram always nudges the
    /// same slot the same way).
    fn accumulate_features(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let chars: Vec<char> = lower.chars().collect();
        let mut acc = vec![0.0f32; self.feature_dim];

        for n in [2usize, 3usize] {
            if chars.len() < n {
                continue;
            }
            for window in chars.windows(n) {
                let ngram: String = window.iter().collect();
                let h = stable_hash(ngram.as_bytes());
                let slot = (h % self.feature_dim as u64) as usize;
                let sign = if (h >> 1) & 1 == 1 { 1.0 } else { -1.0 };
                acc[slot] += sign;
            }
        }

        for word in lower.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            if KEYWORD_VOCAB.contains(&word) {
                let h = stable_hash(word.as_bytes());
                let slot = (h % self.feature_dim as u64) as usize;
                acc[slot] += 3.0; // boost fixed, larger than a single n-gram hit
            }
        }

        let norm: f32 = acc.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut acc {
                *v /= norm;
            }
        }
        acc
    }

    /// Multiply the feature vector through the fixed projection matrix and
    /// normalise the result to the hyperdimensional space.
    fn project(&self, features: &[f32]) -> Hypervector {
        let mut out = vec![0.0f32; self.hv_dim];
        for (row_idx, slot) in out.iter_mut().enumerate() {
            let row = &self.projection[row_idx * self.feature_dim..(row_idx + 1) * self.feature_dim];
            *slot = row.iter().zip(features.iter()).map(|(p, f)| p * f).sum();
        }
        Hypervector::from_values(out).normalised()
    }
}

/// FNV-1a over bytes. `std::hash::Hasher`'s default `RandomState` is
/// randomised per process by design and cannot satisfy the determinism
/// invariant this encoder needs, so n-gram hashing uses a hand-rolled
/// stable hash instead.
fn stable_hash(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    let mut hash = OFFSET;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_is_deterministic() {
        let enc = Encoder::new(256);
        let a = enc.encode("read two integers and print their sum");
        let b = enc.encode("read two integers and print their sum");
        assert_eq!(a.as_slice(), b.as_slice());
    }

    #[test]
    fn related_texts_are_closer_than_unrelated_in_expectation() {
        let enc = Encoder::new(512);
        let a = enc.encode("read two integers from input and print their sum");
        let b = enc.encode("read two numbers from input and print the sum");
        let c = enc.encode("render a fractal image to a PNG file using complex numbers");

        let sim_related = a.cosine(&b);
        let sim_unrelated = a.cosine(&c);
        assert!(
            sim_related > sim_unrelated,
            "related={sim_related} unrelated={sim_unrelated}"
        );
    }

    #[test]
    fn stable_hash_is_stable_across_calls() {
        assert_eq!(stable_hash(b"hello"), stable_hash(b"hello"));
        assert_ne!(stable_hash(b"hello"), stable_hash(b"world"));
    }

    #[test]
    fn encoded_vectors_are_unit_norm() {
        let enc = Encoder::new(128);
        let v = enc.encode("knapsack dynamic programming");
        assert!((v.norm() - 1.0).abs() < 1e-4 || v.norm() == 0.0);
    }
}
