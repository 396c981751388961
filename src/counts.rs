//! Class bigram counts.
//!
//! The corpus is reduced once to its sequence of adjacent token pairs.
//! Every clustering step re-derives the class counts from that fixed
//! sequence under the current [`ClassMap`]:
//!
//! ```text
//! c(l, r)    = #{ i : class(wᵢ) = l, class(wᵢ₊₁) = r }
//! c_left(l)  = Σ_r c(l, r)
//! c_right(r) = Σ_l c(l, r)
//! N          = Σ c(l, r)  = number of pairs
//! ```

use crate::class_map::{ClassId, ClassMap, TokenId};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// The fixed sequence of adjacent token pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPairs {
    pairs: Vec<(TokenId, TokenId)>,
}

impl TokenPairs {
    /// Pair up consecutive ids.
    pub fn from_ids(ids: &[TokenId]) -> Self {
        Self {
            pairs: ids.windows(2).map(|w| (w[0], w[1])).collect(),
        }
    }

    /// Intern `tokens` through `class_map` and pair them up.
    pub fn encode<S: AsRef<str>>(class_map: &ClassMap, tokens: &[S]) -> Result<Self> {
        let ids = tokens
            .iter()
            .map(|t| {
                let t = t.as_ref();
                class_map
                    .token_id(t)
                    .ok_or_else(|| Error::UnknownToken(t.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_ids(&ids))
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// True when the corpus had fewer than two tokens.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterate over pairs in corpus order.
    pub fn iter(&self) -> impl Iterator<Item = &(TokenId, TokenId)> {
        self.pairs.iter()
    }
}

/// Bigram and marginal counts under one class assignment.
///
/// Marginals are dense over class labels; a zero entry means the class
/// never occurs on that side. Bigrams are kept in a `BTreeMap` so that
/// every downstream sum runs in the same order on every run.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassCounts {
    bigram: BTreeMap<(ClassId, ClassId), u64>,
    left: Vec<u64>,
    right: Vec<u64>,
    total: u64,
}

impl ClassCounts {
    /// Count `pairs` under `class_map`.
    pub fn compute(pairs: &TokenPairs, class_map: &ClassMap) -> Self {
        let n = class_map.n_tokens();
        let mut bigram = BTreeMap::new();
        let mut left = vec![0u64; n];
        let mut right = vec![0u64; n];

        for &(w1, w2) in pairs.iter() {
            let l = class_map.class_of(w1);
            let r = class_map.class_of(w2);
            *bigram.entry((l, r)).or_insert(0) += 1;
            left[l] += 1;
            right[r] += 1;
        }

        Self {
            bigram,
            left,
            right,
            total: pairs.len() as u64,
        }
    }

    /// Total number of bigram tokens (N).
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Count of the ordered class bigram `(l, r)`.
    pub fn bigram(&self, l: ClassId, r: ClassId) -> u64 {
        self.bigram.get(&(l, r)).copied().unwrap_or(0)
    }

    /// Left marginal of `class`.
    pub fn left(&self, class: ClassId) -> u64 {
        self.left.get(class).copied().unwrap_or(0)
    }

    /// Right marginal of `class`.
    pub fn right(&self, class: ClassId) -> u64 {
        self.right.get(class).copied().unwrap_or(0)
    }

    /// Bigram count as `f64`, with `epsilon` standing in for zero.
    #[inline]
    pub fn bigram_or(&self, l: ClassId, r: ClassId, epsilon: f64) -> f64 {
        or_epsilon(self.bigram(l, r), epsilon)
    }

    /// Left marginal as `f64`, with `epsilon` standing in for zero.
    #[inline]
    pub fn left_or(&self, class: ClassId, epsilon: f64) -> f64 {
        or_epsilon(self.left(class), epsilon)
    }

    /// Right marginal as `f64`, with `epsilon` standing in for zero.
    #[inline]
    pub fn right_or(&self, class: ClassId, epsilon: f64) -> f64 {
        or_epsilon(self.right(class), epsilon)
    }

    /// Observed bigrams in `(l, r)` order.
    pub fn bigrams(&self) -> impl Iterator<Item = ((ClassId, ClassId), u64)> + '_ {
        self.bigram.iter().map(|(&k, &c)| (k, c))
    }

    /// Classes with a non-zero left marginal, ascending.
    pub fn left_marginals(&self) -> impl Iterator<Item = (ClassId, u64)> + '_ {
        nonzero(&self.left)
    }

    /// Classes with a non-zero right marginal, ascending.
    pub fn right_marginals(&self) -> impl Iterator<Item = (ClassId, u64)> + '_ {
        nonzero(&self.right)
    }

    /// Number of distinct observed bigrams.
    pub fn n_bigrams(&self) -> usize {
        self.bigram.len()
    }
}

#[inline]
fn or_epsilon(count: u64, epsilon: f64) -> f64 {
    if count == 0 {
        epsilon
    } else {
        count as f64
    }
}

fn nonzero(counts: &[u64]) -> impl Iterator<Item = (ClassId, u64)> + '_ {
    counts
        .iter()
        .enumerate()
        .filter(|(_, &c)| c > 0)
        .map(|(class, &c)| (class, c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn setup(tokens: &[&str]) -> (ClassMap, TokenPairs) {
        let map = ClassMap::from_tokens(tokens, 1).unwrap();
        let pairs = TokenPairs::encode(&map, tokens).unwrap();
        (map, pairs)
    }

    #[test]
    fn test_identity_counts_match_raw() {
        let tokens = ["a", "b", "a", "b", "c", "a", "b", "c", "d"];
        let (map, pairs) = setup(&tokens);
        let counts = ClassCounts::compute(&pairs, &map);

        let mut raw: HashMap<(&str, &str), u64> = HashMap::new();
        let mut raw_left: HashMap<&str, u64> = HashMap::new();
        let mut raw_right: HashMap<&str, u64> = HashMap::new();
        for w in tokens.windows(2) {
            *raw.entry((w[0], w[1])).or_default() += 1;
            *raw_left.entry(w[0]).or_default() += 1;
            *raw_right.entry(w[1]).or_default() += 1;
        }

        assert_eq!(counts.total(), 8);
        assert_eq!(counts.n_bigrams(), raw.len());
        for ((l, r), c) in counts.bigrams() {
            assert_eq!(raw[&(map.token(l), map.token(r))], c);
        }
        for (l, c) in counts.left_marginals() {
            assert_eq!(raw_left[map.token(l)], c);
        }
        for (r, c) in counts.right_marginals() {
            assert_eq!(raw_right[map.token(r)], c);
        }
    }

    #[test]
    fn test_counts_follow_merge() {
        let tokens = ["a", "b", "a", "c"];
        let (mut map, pairs) = setup(&tokens);
        map.merge(1, 2);
        let counts = ClassCounts::compute(&pairs, &map);

        // (a,b) (b,a) (a,c) become (a,b) x2 and (b,a).
        assert_eq!(counts.bigram(0, 1), 2);
        assert_eq!(counts.bigram(1, 0), 1);
        assert_eq!(counts.bigram(0, 2), 0);
        assert_eq!(counts.left(0), 2);
        assert_eq!(counts.right(1), 2);
        assert_eq!(counts.right(2), 0);
    }

    #[test]
    fn test_epsilon_substitution() {
        let (map, pairs) = setup(&["a", "b"]);
        let counts = ClassCounts::compute(&pairs, &map);

        assert_eq!(counts.bigram_or(0, 1, 1e-10), 1.0);
        assert_eq!(counts.bigram_or(1, 0, 1e-10), 1e-10);
        assert_eq!(counts.left_or(1, 1e-16), 1e-16);
        assert_eq!(counts.right_or(0, 1e-16), 1e-16);
        // Out-of-range classes behave like absent ones.
        assert_eq!(counts.left(99), 0);
    }

    #[test]
    fn test_single_token_has_no_pairs() {
        let (map, pairs) = setup(&["a"]);
        assert!(pairs.is_empty());
        let counts = ClassCounts::compute(&pairs, &map);
        assert_eq!(counts.total(), 0);
        assert_eq!(counts.left_marginals().count(), 0);
    }

    #[test]
    fn test_encode_unknown_token() {
        let (map, _) = setup(&["a", "b"]);
        assert_eq!(
            TokenPairs::encode(&map, &["a", "z"]),
            Err(Error::UnknownToken("z".into()))
        );
    }
}
