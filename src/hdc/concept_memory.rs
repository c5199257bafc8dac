//! Concept prototype store: classification, running-mean learning, and
//! dynamic splitting of overloaded concepts.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::hypervector::Hypervector;

#[derive(Debug, Error)]
pub enum ConceptMemoryError {
    #[error("dimension mismatch: memory uses {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ConceptMemoryError>;

/// Ring buffer of recent member vectors kept per concept, used only to
/// estimate whether a concept's recent classifications vary widely enough
/// to warrant a split.
const MEMBER_BUFFER_CAP: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    pub name: String,
    pub prototype: Hypervector,
    pub sample_count: u64,
    pub last_updated: DateTime<Utc>,
    #[serde(skip)]
    recent_members: VecDeque<Hypervector>,
}

impl Concept {
    fn new(name: String, hv: Hypervector) -> Self {
        let mut recent_members = VecDeque::with_capacity(MEMBER_BUFFER_CAP);
        recent_members.push_back(hv.clone());
        Self {
            name,
            prototype: hv,
            sample_count: 1,
            last_updated: Utc::now(),
            recent_members,
        }
    }

    fn push_member(&mut self, hv: Hypervector) {
        if self.recent_members.len() == MEMBER_BUFFER_CAP {
            self.recent_members.pop_front();
        }
        self.recent_members.push_back(hv);
    }

    /// Estimate of how widely recent classifications vary: mean pairwise
    /// cosine distance (1 - cosine) across the member buffer, sampled
    /// against the current prototype rather than all-pairs (O(n) not
    /// O(n^2), adequate for a split trigger rather than a precise metric).
    fn recent_variance(&self) -> f32 {
        if self.recent_members.len() < 2 {
            return 0.0;
        }
        let distances: Vec<f32> = self
            .recent_members
            .iter()
            .map(|m| 1.0 - m.cosine(&self.prototype))
            .collect();
        let mean = distances.iter().sum::<f32>() / distances.len() as f32;
        let var = distances.iter().map(|d| (d - mean).powi(2)).sum::<f32>() / distances.len() as f32;
        var
    }
}

/// Ordered name→concept store. Classification, insertion order for tie
/// breaks, and a dynamic new-concept threshold all live here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConceptMemory {
    dim: Option<usize>,
    order: Vec<String>,
    concepts: std::collections::HashMap<String, Concept>,
}

impl ConceptMemory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn num_concepts(&self) -> usize {
        debug_assert_eq!(self.order.len(), self.concepts.len());
        self.order.len()
    }

    /// Concept names in insertion order, used by sleep consolidation to
    /// snapshot the full concept set.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Dynamic "this looks like a new concept" threshold: `max(0.55, 0.9 -
    /// 0.01 * ln(n+1))`. Shrinks (down to a floor) as more concepts
    /// accumulate, since a crowded concept space makes any single
    /// similarity score less discriminating.
    #[must_use]
    pub fn new_concept_threshold(&self) -> f32 {
        let n = self.num_concepts() as f32;
        (0.9 - 0.01 * (n + 1.0).ln()).max(0.55)
    }

    /// Classify `hv` against every prototype by cosine similarity. Ties are
    /// broken by insertion order (first-inserted wins). Returns
    /// `(-1, 0.0, "")` when the memory is empty.
    #[must_use]
    pub fn classify(&self, hv: &Hypervector) -> (i64, f32, String) {
        let mut best: Option<(i64, f32, &str)> = None;
        for (idx, name) in self.order.iter().enumerate() {
            let Some(concept) = self.concepts.get(name) else {
                continue;
            };
            if concept.prototype.dim() != hv.dim() {
                continue;
            }
            let sim = hv.cosine(&concept.prototype);
            let better = match best {
                None => true,
                Some((_, best_sim, _)) => sim > best_sim,
            };
            if better {
                best = Some((idx as i64, sim, name.as_str()));
            }
        }
        match best {
            Some((idx, sim, name)) => (idx, sim, name.to_string()),
            None => (-1, 0.0, String::new()),
        }
    }

    /// Insert a new concept or fold `hv` into an existing one's prototype
    /// via a running mean: `prototype <- normalise((prototype*n + hv) /
    /// (n+1))`.
    ///
    /// # Errors
    /// Returns [`ConceptMemoryError::DimensionMismatch`] if `hv`'s
    /// dimension disagrees with the memory's established dimension.
    pub fn learn(&mut self, name: &str, hv: Hypervector) -> Result<()> {
        match self.dim {
            Some(d) if d != hv.dim() => {
                return Err(ConceptMemoryError::DimensionMismatch {
                    expected: d,
                    actual: hv.dim(),
                });
            }
            None => self.dim = Some(hv.dim()),
            Some(_) => {}
        }

        if let Some(concept) = self.concepts.get_mut(name) {
            let n = concept.sample_count as f32;
            let scaled: Vec<f32> = concept
                .prototype
                .as_slice()
                .iter()
                .zip(hv.as_slice().iter())
                .map(|(p, h)| (p * n + h) / (n + 1.0))
                .collect();
            concept.prototype = Hypervector::from_values(scaled).normalised();
            concept.sample_count += 1;
            concept.last_updated = Utc::now();
            concept.push_member(hv);
        } else {
            self.order.push(name.to_string());
            self.concepts.insert(name.to_string(), Concept::new(name.to_string(), hv));
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Concept> {
        self.concepts.get(name)
    }

    /// Walk concepts with `sample_count > max_samples` and a high recent
    /// variance, splitting each into two prototypes via k-means (k=2) on
    /// its recent-member buffer. Returns the number of splits performed.
    ///
    /// Reference cadence: call this every 50 solves.
    pub fn maybe_split(&mut self, max_samples: u64, variance_threshold: f32) -> usize {
        let candidates: Vec<String> = self
            .order
            .iter()
            .filter(|name| {
                self.concepts
                    .get(name.as_str())
                    .is_some_and(|c| c.sample_count > max_samples && c.recent_variance() > variance_threshold)
            })
            .cloned()
            .collect();

        let mut splits = 0;
        for name in candidates {
            if self.split_concept(&name) {
                splits += 1;
            }
        }
        splits
    }

    /// k-means (k=2) over one concept's recent-member buffer, replacing the
    /// original concept with two new ones named `{name}_a` / `{name}_b`.
    fn split_concept(&mut self, name: &str) -> bool {
        let Some(concept) = self.concepts.get(name) else {
            return false;
        };
        let members: Vec<Hypervector> = concept.recent_members.iter().cloned().collect();
        if members.len() < 4 {
            return false;
        }

        // Seed the two centroids from the two members furthest apart under
        // cosine distance; a cheap, deterministic stand-in for k-means++.
        let (mut ia, mut ib, mut worst) = (0usize, 1usize, -2.0f32);
        for i in 0..members.len() {
            for j in (i + 1)..members.len() {
                let d = 1.0 - members[i].cosine(&members[j]);
                if d > worst {
                    worst = d;
                    ia = i;
                    ib = j;
                }
            }
        }
        let mut centroid_a = members[ia].clone();
        let mut centroid_b = members[ib].clone();

        for _ in 0..5 {
            let mut group_a = Vec::new();
            let mut group_b = Vec::new();
            for m in &members {
                if m.cosine(&centroid_a) >= m.cosine(&centroid_b) {
                    group_a.push(m.clone());
                } else {
                    group_b.push(m.clone());
                }
            }
            if group_a.is_empty() || group_b.is_empty() {
                break;
            }
            centroid_a = Hypervector::bundle(&group_a);
            centroid_b = Hypervector::bundle(&group_b);
        }

        self.concepts.remove(name);
        self.order.retain(|n| n != name);

        let name_a = format!("{name}_a");
        let name_b = format!("{name}_b");
        self.order.push(name_a.clone());
        self.order.push(name_b.clone());
        self.concepts.insert(name_a.clone(), Concept::new(name_a, centroid_a));
        self.concepts.insert(name_b.clone(), Concept::new(name_b, centroid_b));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hv(vals: &[f32]) -> Hypervector {
        Hypervector::from_values(vals.to_vec())
    }

    #[test]
    fn learn_unseen_name_then_classify_matches_with_high_similarity() {
        let mut mem = ConceptMemory::new();
        let v = hv(&[1.0, 0.0, 0.0, 0.0]);
        mem.learn("sum_two_numbers", v.clone()).unwrap();
        let (_, sim, name) = mem.classify(&v);
        assert_eq!(name, "sum_two_numbers");
        assert!(sim > 0.99);
    }

    #[test]
    fn classify_on_empty_memory_returns_sentinel() {
        let mem = ConceptMemory::new();
        let v = hv(&[1.0, 0.0]);
        assert_eq!(mem.classify(&v), (-1, 0.0, String::new()));
    }

    #[test]
    fn learn_averages_into_existing_prototype() {
        let mut mem = ConceptMemory::new();
        mem.learn("concept", hv(&[1.0, 0.0])).unwrap();
        mem.learn("concept", hv(&[0.0, 1.0])).unwrap();
        let concept = mem.get("concept").unwrap();
        assert_eq!(concept.sample_count, 2);
        // Averaged and renormalised: should now sit between the two axes.
        assert!(concept.prototype.as_slice()[0] > 0.0);
        assert!(concept.prototype.as_slice()[1] > 0.0);
    }

    #[test]
    fn num_concepts_matches_cardinality_invariant() {
        let mut mem = ConceptMemory::new();
        mem.learn("a", hv(&[1.0, 0.0])).unwrap();
        mem.learn("b", hv(&[0.0, 1.0])).unwrap();
        assert_eq!(mem.num_concepts(), 2);
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut mem = ConceptMemory::new();
        mem.learn("a", hv(&[1.0, 0.0])).unwrap();
        let err = mem.learn("b", hv(&[1.0, 0.0, 0.0])).unwrap_err();
        assert!(matches!(err, ConceptMemoryError::DimensionMismatch { .. }));
    }

    #[test]
    fn new_concept_threshold_shrinks_with_population_but_has_a_floor() {
        let mut mem = ConceptMemory::new();
        let t0 = mem.new_concept_threshold();
        for i in 0..200 {
            mem.learn(&format!("c{i}"), hv(&[i as f32, 1.0])).unwrap();
        }
        let t1 = mem.new_concept_threshold();
        assert!(t1 <= t0);
        assert!(t1 >= 0.55);
    }
}
