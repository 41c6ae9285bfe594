//! Term weighting schemes.
//!
//! Documents are weighted with LNC (log tf, no idf, cosine normalization) and
//! queries with LTC (log tf, idf, cosine normalization). The dot product of the
//! two unit vectors is then the cosine similarity. IDF is only known once a
//! term's posting list is final, so it is assigned by [`Weighting::finalize`]
//! after the merge rather than while documents are indexed.

use crate::PostingList;
use std::collections::HashMap;

pub trait Weighting {
    /// Per-term weight for the raw counts of one document or query.
    fn weights(&mut self, raw_counts: &HashMap<String, u32>) -> HashMap<String, f32>;

    /// Scales a weight by the norm accumulated since the last reset.
    fn normalize(&self, weight: f32) -> f32;

    fn reset_accumulator(&mut self);

    /// IDF of a term whose posting list is complete.
    ///
    /// Idempotent for a given list length and document count.
    fn finalize(&self, term: &str, postings: &PostingList, total_documents: u64) -> Option<f32>;
}

#[inline]
pub fn log_tf(count: u32) -> f32 {
    1.0 + (count as f32).log10()
}

#[inline]
pub fn idf(document_frequency: usize, total_documents: u64) -> f32 {
    (total_documents as f64 / document_frequency.max(1) as f64).log10() as f32
}

/// Running sum of squares for cosine normalization.
#[derive(Debug, Default, Clone)]
struct CosineNorm {
    sum_of_squares: f64,
}

impl CosineNorm {
    fn add(&mut self, weight: f32) {
        self.sum_of_squares += (weight as f64) * (weight as f64);
    }

    fn apply(&self, weight: f32) -> f32 {
        let factor = self.sum_of_squares.sqrt();
        if factor == 0.0 {
            weight
        } else {
            (weight as f64 / factor) as f32
        }
    }
}

/// Index-side weighting.
#[derive(Debug, Default, Clone)]
pub struct Lnc {
    norm: CosineNorm,
}

impl Lnc {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Weighting for Lnc {
    fn weights(&mut self, raw_counts: &HashMap<String, u32>) -> HashMap<String, f32> {
        // sorted, so the norm of a document does not depend on hash order
        let mut counts: Vec<(&String, &u32)> = raw_counts.iter().collect();
        counts.sort_unstable_by(|a, b| a.0.cmp(b.0));
        counts
            .into_iter()
            .map(|(term, &count)| {
                let w = log_tf(count);
                self.norm.add(w);
                (term.clone(), w)
            })
            .collect()
    }

    fn normalize(&self, weight: f32) -> f32 {
        self.norm.apply(weight)
    }

    fn reset_accumulator(&mut self) {
        self.norm = CosineNorm::default();
    }

    fn finalize(&self, _term: &str, postings: &PostingList, total_documents: u64) -> Option<f32> {
        Some(idf(postings.len(), total_documents))
    }
}

/// Query-side weighting.
///
/// `weights` returns un-normalized log tf; each surviving term then goes through
/// [`Ltc::apply_idf`], which is where the norm is accumulated.
#[derive(Debug, Default, Clone)]
pub struct Ltc {
    norm: CosineNorm,
}

impl Ltc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_idf(&mut self, weight: f32, idf: f32) -> f32 {
        let w = weight * idf;
        self.norm.add(w);
        w
    }
}

impl Weighting for Ltc {
    fn weights(&mut self, raw_counts: &HashMap<String, u32>) -> HashMap<String, f32> {
        raw_counts.iter().map(|(term, &count)| (term.clone(), log_tf(count))).collect()
    }

    fn normalize(&self, weight: f32) -> f32 {
        self.norm.apply(weight)
    }

    fn reset_accumulator(&mut self) {
        self.norm = CosineNorm::default();
    }

    fn finalize(&self, _term: &str, postings: &PostingList, total_documents: u64) -> Option<f32> {
        Some(idf(postings.len(), total_documents))
    }
}

/// Frequency-only indexes: the weight is the count itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct RawFrequency;

impl Weighting for RawFrequency {
    fn weights(&mut self, raw_counts: &HashMap<String, u32>) -> HashMap<String, f32> {
        raw_counts.iter().map(|(term, &count)| (term.clone(), count as f32)).collect()
    }

    fn normalize(&self, weight: f32) -> f32 {
        weight
    }

    fn reset_accumulator(&mut self) {}

    fn finalize(&self, _term: &str, _postings: &PostingList, _total_documents: u64) -> Option<f32> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Posting;

    fn counts(pairs: &[(&str, u32)]) -> HashMap<String, u32> {
        pairs.iter().map(|(t, c)| (t.to_string(), *c)).collect()
    }

    #[test]
    fn lnc_vector_has_unit_length() {
        let mut lnc = Lnc::new();
        let raw = lnc.weights(&counts(&[("a", 1), ("b", 10), ("c", 3)]));
        assert!((raw["b"] - 2.0).abs() < 1e-6);
        let sum: f32 = raw.values().map(|&w| lnc.normalize(w).powi(2)).sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn reset_forgets_previous_document() {
        let mut lnc = Lnc::new();
        lnc.weights(&counts(&[("a", 100)]));
        lnc.reset_accumulator();
        let w = lnc.weights(&counts(&[("z", 1)]));
        assert!((lnc.normalize(w["z"]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn idf_bounds() {
        let mut all = PostingList::new();
        for id in 1..=4 {
            all.push(Posting::new(id, 1.0)).unwrap();
        }
        let lnc = Lnc::new();
        assert_eq!(lnc.finalize("t", &all, 4), Some(0.0));
        let mut one = PostingList::new();
        one.push(Posting::new(2, 1.0)).unwrap();
        let v = lnc.finalize("t", &one, 1000).unwrap();
        assert!((v - 3.0).abs() < 1e-6);
        assert_eq!(lnc.finalize("t", &one, 1000), Some(v));
    }

    #[test]
    fn ltc_accumulates_only_after_idf() {
        let mut ltc = Ltc::new();
        let w = ltc.weights(&counts(&[("x", 1), ("y", 1)]));
        let x = ltc.apply_idf(w["x"], 3.0);
        let y = ltc.apply_idf(w["y"], 4.0);
        assert!((ltc.normalize(x) - 0.6).abs() < 1e-6);
        assert!((ltc.normalize(y) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn raw_frequency_keeps_counts() {
        let mut raw = RawFrequency;
        let w = raw.weights(&counts(&[("x", 7)]));
        assert_eq!(raw.normalize(w["x"]), 7.0);
        assert_eq!(raw.finalize("x", &PostingList::new(), 3), None);
    }
}
