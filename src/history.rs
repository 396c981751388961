//! Merge history of a clustering run.
//!
//! The history is a dendrogram over the filtered tokens: it starts with
//! one class per filtered token and records every merge in order. Replaying
//! a prefix of it recovers the partition at any intermediate class count,
//! so a single run down to one class serves every `k`.

use crate::error::{Error, Result};
use core::fmt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single merge step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRecord {
    /// Zero-based step index.
    pub step: usize,
    /// Label of the surviving class.
    pub survivor: String,
    /// Label of the absorbed class.
    pub absorbed: String,
    /// AMI lost by this merge.
    pub loss: f64,
    /// Filtered classes remaining after the merge.
    pub n_classes: usize,
}

impl fmt::Display for MergeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.survivor, self.absorbed)
    }
}

/// Ordered merge records over an initial set of singleton classes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MergeHistory {
    /// Filtered tokens, each its own class before the first merge.
    leaves: Vec<String>,
    /// Merges in the order they happened.
    merges: Vec<MergeRecord>,
}

impl MergeHistory {
    /// Empty history over `leaves`.
    pub fn new(leaves: Vec<String>) -> Self {
        Self {
            merges: Vec::with_capacity(leaves.len().saturating_sub(1)),
            leaves,
        }
    }

    /// Append a merge.
    pub fn push(&mut self, record: MergeRecord) {
        self.merges.push(record);
    }

    /// Number of initial classes.
    pub fn n_items(&self) -> usize {
        self.leaves.len()
    }

    /// Number of merges recorded.
    pub fn len(&self) -> usize {
        self.merges.len()
    }

    /// True before the first merge.
    pub fn is_empty(&self) -> bool {
        self.merges.is_empty()
    }

    /// Iterate over merges.
    pub fn iter(&self) -> impl Iterator<Item = &MergeRecord> {
        self.merges.iter()
    }

    /// Initial filtered tokens.
    pub fn leaves(&self) -> &[String] {
        &self.leaves
    }

    /// Loss of each merge, in order.
    pub fn losses(&self) -> Vec<f64> {
        self.merges.iter().map(|m| m.loss).collect()
    }

    /// Sum of all merge losses.
    pub fn total_loss(&self) -> f64 {
        self.merges.iter().map(|m| m.loss).sum()
    }

    /// Filtered partition with `k` classes, as `(token, label)` in leaf order.
    ///
    /// Replays the first `n_items - k` merges. Fails when `k` is zero,
    /// larger than the number of leaves, or below what the recorded merges
    /// reach.
    pub fn cut_to_k(&self, k: usize) -> Result<Vec<(String, String)>> {
        let n = self.leaves.len();
        let reachable = n.saturating_sub(self.merges.len());
        if k == 0 || k > n || k < reachable {
            return Err(Error::InvalidClassCount {
                requested: k,
                available: n,
            });
        }

        let mut labels: HashMap<&str, &str> =
            self.leaves.iter().map(|t| (t.as_str(), t.as_str())).collect();

        for merge in &self.merges[..n - k] {
            for name in [&merge.survivor, &merge.absorbed] {
                if !labels.contains_key(name.as_str()) {
                    return Err(Error::UnknownToken(name.clone()));
                }
            }
            for label in labels.values_mut() {
                if *label == merge.absorbed {
                    *label = merge.survivor.as_str();
                }
            }
        }

        Ok(self
            .leaves
            .iter()
            .map(|t| (t.clone(), labels[t.as_str()].to_string()))
            .collect())
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a history written by [`to_json`](Self::to_json).
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(
        step: usize,
        survivor: &str,
        absorbed: &str,
        loss: f64,
        n_classes: usize,
    ) -> MergeRecord {
        MergeRecord {
            step,
            survivor: survivor.into(),
            absorbed: absorbed.into(),
            loss,
            n_classes,
        }
    }

    fn history() -> MergeHistory {
        let mut h = MergeHistory::new(["a", "b", "c", "d"].map(String::from).to_vec());
        h.push(record(0, "a", "c", 0.1, 3));
        h.push(record(1, "b", "d", 0.2, 2));
        h.push(record(2, "a", "b", 0.4, 1));
        h
    }

    #[test]
    fn test_history_creation() {
        let h = MergeHistory::new(vec!["x".into(), "y".into()]);
        assert_eq!(h.n_items(), 2);
        assert!(h.is_empty());
    }

    #[test]
    fn test_losses() {
        let h = history();
        assert_eq!(h.len(), 3);
        assert_eq!(h.losses(), vec![0.1, 0.2, 0.4]);
        assert!((h.total_loss() - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_cut_to_k() {
        let h = history();
        let labels = |k| {
            h.cut_to_k(k)
                .unwrap()
                .into_iter()
                .map(|(_, l)| l)
                .collect::<Vec<_>>()
        };

        assert_eq!(labels(4), vec!["a", "b", "c", "d"]);
        assert_eq!(labels(3), vec!["a", "b", "a", "d"]);
        assert_eq!(labels(2), vec!["a", "b", "a", "b"]);
        assert_eq!(labels(1), vec!["a", "a", "a", "a"]);
    }

    #[test]
    fn test_cut_out_of_range() {
        let h = history();
        assert!(h.cut_to_k(0).is_err());
        assert!(h.cut_to_k(5).is_err());

        let mut partial = MergeHistory::new(["a", "b", "c"].map(String::from).to_vec());
        partial.push(record(0, "a", "b", 0.1, 2));
        assert!(partial.cut_to_k(2).is_ok());
        assert_eq!(
            partial.cut_to_k(1),
            Err(Error::InvalidClassCount {
                requested: 1,
                available: 3
            })
        );
    }

    #[test]
    fn test_cut_rejects_unknown_label() {
        let mut h = MergeHistory::new(vec!["a".into(), "b".into()]);
        h.push(record(0, "a", "z", 0.0, 1));
        assert_eq!(h.cut_to_k(1), Err(Error::UnknownToken("z".into())));
    }

    #[test]
    fn test_json_roundtrip_preserves_replay() {
        let h = history();
        let restored = MergeHistory::from_json(&h.to_json().unwrap()).unwrap();
        assert_eq!(restored, h);
        assert_eq!(restored.cut_to_k(2).unwrap(), h.cut_to_k(2).unwrap());
        assert!(MergeHistory::from_json("{").is_err());
    }

    #[test]
    fn test_record_display() {
        assert_eq!(record(0, "the", "a", 0.0, 1).to_string(), "(the, a)");
    }
}
