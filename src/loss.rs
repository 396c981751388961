//! Merge losses between filtered classes.
//!
//! # Full evaluation
//!
//! The AMI lost by merging `a` and `b` is everything `a` and `b`
//! contributed, minus everything the merged class `ab` would contribute:
//!
//! ```text
//! L(a,b) = s(a) + s(b) − q(a,b) − q(b,a)
//!        − q'(ab, ab) − Σ_{l≠a,b} q'(l, ab) − Σ_{r≠a,b} q'(ab, r)
//! ```
//!
//! where `q'` is [`pmi_term`] on summed counts. One pair costs O(k), the
//! whole table O(k³). [`LossTable::full`] does exactly this and is used for
//! the first step and as a reference.
//!
//! # Incremental update
//!
//! After `b` was absorbed into `a`, a pair `{i, j}` not touching `a` only
//! changes through its terms against `a` and `b` (Brown et al. 1992):
//!
//! ```text
//! L'(i,j) = L(i,j) − s(i) + s'(i) − s(j) + s'(j)
//!         + q(i+j, a) + q(a, i+j) + q(i+j, b) + q(b, i+j)
//!         − q'(i+j, a) − q'(a, i+j)
//! ```
//!
//! Pairs involving `a` are evaluated in full on the new tables. That makes
//! a step O(k²) patches plus O(k²) for the `a` row.
//!
//! # Iteration order
//!
//! Pairs are visited as `(classes[i], classes[j])` for `i < j`, with
//! `classes` in first-appearance order. The first strictly smaller loss
//! wins, so on exact ties the earliest pair is merged and the class that
//! appeared first survives.
//!
//! A scan over filtered tokens instead of classes also sees every pair in
//! reversed orientation, where the epsilon terms can make it smaller in
//! the last bits. Such a scan merges the same classes at every step; only
//! the survivor's label can differ.

use crate::class_map::ClassId;
use crate::pmi::{pmi_term, Statistics, INCREMENTAL_EPSILON};
use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Unordered pair of classes, stored in iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassPair {
    /// Class that appeared first; survives the merge.
    pub first: ClassId,
    /// Class that appeared later; absorbed by the merge.
    pub second: ClassId,
}

impl ClassPair {
    /// Normalize `{a, b}` into iteration order.
    pub fn new(a: ClassId, b: ClassId) -> Self {
        Self {
            first: a.min(b),
            second: a.max(b),
        }
    }

    /// Whether `class` is one side of the pair.
    pub fn contains(&self, class: ClassId) -> bool {
        self.first == class || self.second == class
    }
}

/// Loss of merging `a` and `b` on a single snapshot.
///
/// Missing counts are replaced by `epsilon`. A missing `q(a,b)` counts as
/// zero while a missing `q(b,a)` counts as `epsilon`.
pub fn merge_loss(stats: &Statistics, a: ClassId, b: ClassId, epsilon: f64) -> f64 {
    let e = epsilon;
    let c = &stats.counts;
    let q = &stats.pmi;
    let n = c.total() as f64;

    let mut loss =
        stats.scores.get(a) + stats.scores.get(b) - q.get_or(a, b, 0.0) - q.get_or(b, a, e);

    let left_ab = c.left_or(a, e) + c.left_or(b, e);
    let right_ab = c.right_or(a, e) + c.right_or(b, e);

    let self_count =
        c.bigram_or(a, b, e) + c.bigram_or(b, a, e) + c.bigram_or(a, a, e) + c.bigram_or(b, b, e);
    loss -= pmi_term(n, self_count, left_ab, right_ab);

    for (l, l_count) in c.left_marginals() {
        if l != a && l != b {
            let joint = c.bigram_or(l, a, e) + c.bigram_or(l, b, e);
            loss -= pmi_term(n, joint, l_count as f64, right_ab);
        }
    }

    for (r, r_count) in c.right_marginals() {
        if r != a && r != b {
            let joint = c.bigram_or(a, r, e) + c.bigram_or(b, r, e);
            loss -= pmi_term(n, joint, left_ab, r_count as f64);
        }
    }

    loss
}

/// Patch `L(i,j)` across the merge of `b` into `a`.
///
/// `prev` holds the tables before the merge, `next` after. Neither `i`
/// nor `j` may be `a` or `b`.
#[allow(clippy::too_many_arguments)]
pub fn patched_loss(
    prev: &Statistics,
    next: &Statistics,
    prev_loss: f64,
    i: ClassId,
    j: ClassId,
    a: ClassId,
    b: ClassId,
    epsilon: f64,
) -> f64 {
    let e = epsilon;
    let n = next.counts.total() as f64;

    let mut loss = prev_loss - prev.scores.get(i) + next.scores.get(i) - prev.scores.get(j)
        + next.scores.get(j);

    // Give back what i+j shared with a and b separately.
    let pc = &prev.counts;
    let left_ij = pc.left_or(i, e) + pc.left_or(j, e);
    let right_ij = pc.right_or(i, e) + pc.right_or(j, e);
    for x in [a, b] {
        loss += pmi_term(
            n,
            pc.bigram_or(i, x, e) + pc.bigram_or(j, x, e),
            left_ij,
            pc.right_or(x, e),
        );
        loss += pmi_term(
            n,
            pc.bigram_or(x, i, e) + pc.bigram_or(x, j, e),
            pc.left_or(x, e),
            right_ij,
        );
    }

    // Take away what i+j shares with the merged class.
    let nc = &next.counts;
    loss -= pmi_term(
        n,
        nc.bigram_or(i, a, e) + nc.bigram_or(j, a, e),
        nc.left_or(i, e) + nc.left_or(j, e),
        nc.right_or(a, e),
    );
    loss -= pmi_term(
        n,
        nc.bigram_or(a, i, e) + nc.bigram_or(a, j, e),
        nc.left_or(a, e),
        nc.right_or(i, e) + nc.right_or(j, e),
    );

    loss
}

/// Losses for every pair of live filtered classes.
#[derive(Debug, Clone)]
pub struct LossTable {
    /// Filtered classes in iteration order.
    classes: Vec<ClassId>,
    /// Loss per pair.
    losses: HashMap<ClassPair, f64>,
    /// First minimum in iteration order.
    best: Option<(ClassPair, f64)>,
}

impl LossTable {
    /// Evaluate every pair from scratch. O(k³).
    pub fn full(stats: &Statistics, classes: Vec<ClassId>, epsilon: f64) -> Self {
        let pairs = ordered_pairs(&classes);
        let values = evaluate(&pairs, |p| merge_loss(stats, p.first, p.second, epsilon));
        Self::assemble(classes, pairs, values)
    }

    /// Table after `merged.second` was absorbed into `merged.first`.
    ///
    /// `classes` lists the surviving filtered classes in iteration order;
    /// `prev` and `next` are the statistics before and after the merge.
    pub fn update(
        &self,
        prev: &Statistics,
        next: &Statistics,
        classes: Vec<ClassId>,
        merged: ClassPair,
    ) -> Self {
        let e = INCREMENTAL_EPSILON;
        let (a, b) = (merged.first, merged.second);
        let pairs = ordered_pairs(&classes);
        let values = evaluate(&pairs, |p| {
            if p.contains(a) {
                return merge_loss(next, p.first, p.second, e);
            }
            match self.losses.get(&p) {
                Some(&prev_loss) => {
                    patched_loss(prev, next, prev_loss, p.first, p.second, a, b, e)
                }
                // Only reachable when `classes` grew, which merging never does.
                None => merge_loss(next, p.first, p.second, e),
            }
        });
        Self::assemble(classes, pairs, values)
    }

    fn assemble(classes: Vec<ClassId>, pairs: Vec<ClassPair>, values: Vec<f64>) -> Self {
        let mut best: Option<(ClassPair, f64)> = None;
        for (&pair, &loss) in pairs.iter().zip(&values) {
            if best.map_or(true, |(_, min)| loss < min) {
                best = Some((pair, loss));
            }
        }
        Self {
            classes,
            losses: pairs.into_iter().zip(values).collect(),
            best,
        }
    }

    /// Loss of merging `a` and `b`, in either order.
    pub fn get(&self, a: ClassId, b: ClassId) -> Option<f64> {
        self.losses.get(&ClassPair::new(a, b)).copied()
    }

    /// Cheapest merge; ties go to the earliest pair in iteration order.
    pub fn best(&self) -> Option<(ClassPair, f64)> {
        self.best
    }

    /// Filtered classes the table covers, in iteration order.
    pub fn classes(&self) -> &[ClassId] {
        &self.classes
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.losses.len()
    }

    /// True when fewer than two classes remain.
    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    /// Iterate pairs and losses in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassPair, f64)> + '_ {
        self.losses.iter().map(|(&p, &l)| (p, l))
    }
}

fn ordered_pairs(classes: &[ClassId]) -> Vec<ClassPair> {
    let k = classes.len();
    let mut pairs = Vec::with_capacity(k * k.saturating_sub(1) / 2);
    for (i, &a) in classes.iter().enumerate() {
        for &b in &classes[i + 1..] {
            pairs.push(ClassPair { first: a, second: b });
        }
    }
    pairs
}

#[cfg(feature = "parallel")]
fn evaluate<F>(pairs: &[ClassPair], f: F) -> Vec<f64>
where
    F: Fn(ClassPair) -> f64 + Sync + Send,
{
    pairs.par_iter().map(|&p| f(p)).collect()
}

#[cfg(not(feature = "parallel"))]
fn evaluate<F>(pairs: &[ClassPair], f: F) -> Vec<f64>
where
    F: Fn(ClassPair) -> f64 + Sync + Send,
{
    pairs.iter().map(|&p| f(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_map::ClassMap;
    use crate::counts::TokenPairs;
    use crate::pmi::FULL_PASS_EPSILON;

    fn corpus() -> Vec<&'static str> {
        [
            "the", "cat", "sat", "on", "the", "mat", "a", "dog", "sat", "on", "a", "mat", "the",
            "dog", "ran", "a", "cat", "ran",
        ]
        .repeat(4)
    }

    fn setup() -> (ClassMap, TokenPairs, Statistics) {
        let tokens = corpus();
        let map = ClassMap::from_tokens(&tokens, 4).unwrap();
        let pairs = TokenPairs::encode(&map, &tokens).unwrap();
        let stats = Statistics::compute(&pairs, &map);
        (map, pairs, stats)
    }

    #[test]
    fn test_class_pair_normalizes() {
        let p = ClassPair::new(7, 3);
        assert_eq!(p, ClassPair { first: 3, second: 7 });
        assert!(p.contains(7));
        assert!(!p.contains(5));
    }

    #[test]
    fn test_loss_equals_ami_drop() {
        let (map, pairs, stats) = setup();
        let classes = map.filtered_classes();
        for (i, &a) in classes.iter().enumerate() {
            for &b in &classes[i + 1..] {
                let mut merged = map.clone();
                merged.merge(a, b);
                let drop = stats.ami() - Statistics::compute(&pairs, &merged).ami();
                let loss = merge_loss(&stats, a, b, FULL_PASS_EPSILON);
                assert!((drop - loss).abs() < 1e-6, "{a},{b}: drop {drop} loss {loss}");
                assert!(loss > -1e-9);
            }
        }
    }

    #[test]
    fn test_full_table_shape() {
        let (map, _, stats) = setup();
        let classes = map.filtered_classes();
        let k = classes.len();
        let table = LossTable::full(&stats, classes, FULL_PASS_EPSILON);

        assert_eq!(table.len(), k * (k - 1) / 2);
        let (best, min) = table.best().unwrap();
        assert!(best.first < best.second);
        assert!(table.iter().all(|(_, l)| l >= min));
        assert_eq!(table.get(best.second, best.first), Some(min));
    }

    #[test]
    fn test_update_matches_full_recompute() {
        let (mut map, pairs, stats) = setup();
        let table = LossTable::full(&stats, map.filtered_classes(), FULL_PASS_EPSILON);
        let (merged, _) = table.best().unwrap();

        map.merge(merged.first, merged.second);
        let next = stats.after_merge(&pairs, &map, merged.first, merged.second);
        let patched = table.update(&stats, &next, map.filtered_classes(), merged);
        let reference = LossTable::full(&next, map.filtered_classes(), INCREMENTAL_EPSILON);

        assert_eq!(patched.len(), reference.len());
        for (pair, loss) in reference.iter() {
            let got = patched.get(pair.first, pair.second).unwrap();
            assert!((got - loss).abs() < 1e-6, "{pair:?}: {got} vs {loss}");
        }
        let (chosen, _) = patched.best().unwrap();
        let (_, min) = reference.best().unwrap();
        let chosen_loss = reference.get(chosen.first, chosen.second).unwrap();
        assert!((chosen_loss - min).abs() < 1e-6);
    }

    #[test]
    fn test_tie_goes_to_first_pair() {
        // Two disjoint copies of the same pattern: symmetric losses.
        let tokens: Vec<&str> = ["x", "y", "x", "y", "u", "v", "u", "v"].repeat(3);
        let map = ClassMap::from_tokens(&tokens, 1).unwrap();
        let pairs = TokenPairs::encode(&map, &tokens).unwrap();
        let stats = Statistics::compute(&pairs, &map);
        let table = LossTable::full(&stats, map.filtered_classes(), FULL_PASS_EPSILON);

        let (best, min) = table.best().unwrap();
        let first_min = ordered_pairs(table.classes())
            .into_iter()
            .find(|p| table.get(p.first, p.second) == Some(min))
            .unwrap();
        assert_eq!(best, first_min);
    }

    #[test]
    fn test_single_class_has_no_pairs() {
        let (map, _, stats) = setup();
        let table = LossTable::full(&stats, vec![map.filtered_classes()[0]], FULL_PASS_EPSILON);
        assert!(table.is_empty());
        assert_eq!(table.best(), None);
    }
}
