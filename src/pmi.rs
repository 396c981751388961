//! Pointwise mutual information over class bigrams.
//!
//! # Quantities
//!
//! For an observed class bigram `(l, r)` with count `c`:
//!
//! ```text
//! q(l, r) = c/N × log₂( N·c / (c_left(l) × c_right(r)) )
//! ```
//!
//! The average mutual information of a class assignment is the sum of `q`
//! over all observed bigrams, and the score of a class is the sum of every
//! `q` it takes part in, with its self-bigram counted once:
//!
//! ```text
//! AMI  = Σ_{l,r} q(l, r)
//! s(l) = Σ_r q(l, r) + Σ_r q(r, l) − q(l, l)
//! ```
//!
//! # Epsilon substitution
//!
//! Counterfactual terms (what `q` would be after a merge) are evaluated on
//! summed counts that may be zero. Zero counts and marginals are replaced by
//! a tiny positive constant instead of being skipped. The replacement keeps
//! the term finite and negligible, and it is part of the numeric contract:
//! loss values depend on it at the last few bits, so the constants are fixed.

use crate::class_map::{ClassId, ClassMap};
use crate::counts::{ClassCounts, TokenPairs};
use std::collections::BTreeMap;

/// Stand-in for a zero count during the initial full loss pass.
pub const FULL_PASS_EPSILON: f64 = 1e-10;

/// Stand-in for a zero count during incremental updates.
pub const INCREMENTAL_EPSILON: f64 = 1e-16;

/// Weighted PMI of a (possibly combined) bigram count.
///
/// `n` is the total bigram count, `joint` the bigram count and `left` /
/// `right` the marginals. All arguments must be positive; callers pass an
/// epsilon in place of zero.
#[inline]
pub fn pmi_term(n: f64, joint: f64, left: f64, right: f64) -> f64 {
    joint / n * (n * (joint / (left * right))).log2()
}

/// `q` for every observed class bigram.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PmiTable {
    q: BTreeMap<(ClassId, ClassId), f64>,
}

impl PmiTable {
    /// Evaluate `q` over the observed bigrams of `counts`.
    pub fn from_counts(counts: &ClassCounts) -> Self {
        let n = counts.total() as f64;
        let q = counts
            .bigrams()
            .map(|((l, r), c)| {
                let value = pmi_term(n, c as f64, counts.left(l) as f64, counts.right(r) as f64);
                ((l, r), value)
            })
            .collect();
        Self { q }
    }

    /// `q(l, r)`, if the bigram was observed.
    pub fn get(&self, l: ClassId, r: ClassId) -> Option<f64> {
        self.q.get(&(l, r)).copied()
    }

    /// `q(l, r)`, or `default` for an unobserved bigram.
    #[inline]
    pub fn get_or(&self, l: ClassId, r: ClassId, default: f64) -> f64 {
        self.get(l, r).unwrap_or(default)
    }

    /// Average mutual information: Σ q.
    pub fn ami(&self) -> f64 {
        self.q.values().sum()
    }

    /// Score of a single class, computed directly from the table.
    pub fn score_of(&self, class: ClassId) -> f64 {
        let mut score = 0.0;
        for (&(l, r), &q) in &self.q {
            if l == class {
                score += q;
            }
            if r == class {
                score += q;
            }
        }
        score - self.get_or(class, class, 0.0)
    }

    /// Number of observed bigrams.
    pub fn len(&self) -> usize {
        self.q.len()
    }

    /// True when nothing was observed.
    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// Iterate `((l, r), q)` in bigram order.
    pub fn iter(&self) -> impl Iterator<Item = ((ClassId, ClassId), f64)> + '_ {
        self.q.iter().map(|(&k, &v)| (k, v))
    }
}

/// Per-class scores `s`, dense over class labels.
///
/// Classes that never occur score zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scores {
    s: Vec<f64>,
}

impl Scores {
    /// Score every class from scratch.
    pub fn from_pmi(pmi: &PmiTable, n_labels: usize) -> Self {
        let mut s = vec![0.0; n_labels];
        let mut seen = vec![false; n_labels];
        for ((l, r), q) in pmi.iter() {
            s[l] += q;
            s[r] += q;
            seen[l] = true;
            seen[r] = true;
        }
        for (class, score) in s.iter_mut().enumerate() {
            if seen[class] {
                *score -= pmi.get_or(class, class, 0.0);
            }
        }
        Self { s }
    }

    /// Score of `class`.
    #[inline]
    pub fn get(&self, class: ClassId) -> f64 {
        self.s.get(class).copied().unwrap_or(0.0)
    }

    /// Number of label slots.
    pub fn len(&self) -> usize {
        self.s.len()
    }

    /// True when there are no label slots.
    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }
}

/// Counts, PMI and scores for one class assignment.
///
/// One value of this type is produced per clustering step and never
/// mutated afterwards; the loss engine reads the previous and the current
/// snapshot side by side.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    /// Bigram and marginal counts.
    pub counts: ClassCounts,
    /// `q` per observed bigram.
    pub pmi: PmiTable,
    /// `s` per class.
    pub scores: Scores,
}

impl Statistics {
    /// Compute every table from scratch.
    pub fn compute(pairs: &TokenPairs, class_map: &ClassMap) -> Self {
        let counts = ClassCounts::compute(pairs, class_map);
        let pmi = PmiTable::from_counts(&counts);
        let scores = Scores::from_pmi(&pmi, class_map.n_tokens());
        Self {
            counts,
            pmi,
            scores,
        }
    }

    /// Tables after `b` was absorbed into `a`.
    ///
    /// Counts and `q` are recomputed against `class_map`, which must already
    /// reflect the merge. Scores of untouched classes are patched: only
    /// their terms against `a` and `b` changed. The survivor's own score is
    /// recomputed.
    pub fn after_merge(
        &self,
        pairs: &TokenPairs,
        class_map: &ClassMap,
        a: ClassId,
        b: ClassId,
    ) -> Self {
        let e = INCREMENTAL_EPSILON;
        let counts = ClassCounts::compute(pairs, class_map);
        let pmi = PmiTable::from_counts(&counts);

        let old_q = &self.pmi;
        let old_s = &self.scores;
        let mut s = vec![0.0; class_map.n_tokens()];
        for i in class_map.live_classes() {
            s[i] = if i == a {
                pmi.score_of(a)
            } else {
                old_s.get(i)
                    - old_q.get_or(i, a, e)
                    - old_q.get_or(a, i, e)
                    - old_q.get_or(i, b, e)
                    - old_q.get_or(b, i, e)
                    + pmi.get_or(a, i, e)
                    + pmi.get_or(i, a, e)
            };
        }

        Self {
            counts,
            pmi,
            scores: Scores { s },
        }
    }

    /// Average mutual information of this assignment.
    pub fn ami(&self) -> f64 {
        self.pmi.ami()
    }
}
