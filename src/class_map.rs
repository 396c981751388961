//! Token → class assignment.
//!
//! Every distinct token starts out as its own class, labelled by itself.
//! Tokens whose corpus frequency reaches the threshold are *filtered*:
//! only they take part in merging. The rest keep their singleton class
//! forever but still show up as bigram neighbours.
//!
//! Tokens are interned into dense ids in order of first appearance, and a
//! class label is the id of the token that names it. Ordering classes by
//! label therefore orders them by first corpus appearance, which is the
//! iteration order the loss scan depends on for tie-breaking.

use crate::error::{Error, Result};
use std::collections::{HashMap, HashSet};

/// Dense token id (index of first appearance).
pub type TokenId = usize;

/// Class label: the id of the token naming the class.
pub type ClassId = usize;

/// Assignment of every vocabulary token to a class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMap {
    /// Token strings, indexed by id.
    vocab: Vec<String>,
    /// Reverse lookup.
    index: HashMap<String, TokenId>,
    /// Corpus frequency per token.
    frequency: Vec<usize>,
    /// Current class of each token.
    labels: Vec<ClassId>,
    /// Whether each token passed the frequency filter.
    filtered: Vec<bool>,
    /// Threshold used to build the filter.
    min_frequency: usize,
}

impl ClassMap {
    /// Build the initial identity map from a token sequence.
    pub fn from_tokens<S: AsRef<str>>(tokens: &[S], min_frequency: usize) -> Result<Self> {
        if tokens.is_empty() {
            return Err(Error::EmptyInput);
        }

        let mut vocab: Vec<String> = Vec::new();
        let mut index: HashMap<String, TokenId> = HashMap::new();
        let mut frequency: Vec<usize> = Vec::new();

        for token in tokens {
            let token = token.as_ref();
            match index.get(token) {
                Some(&id) => frequency[id] += 1,
                None => {
                    index.insert(token.to_string(), vocab.len());
                    vocab.push(token.to_string());
                    frequency.push(1);
                }
            }
        }

        let labels = (0..vocab.len()).collect();
        let filtered = frequency.iter().map(|&f| f >= min_frequency).collect();

        Ok(Self {
            vocab,
            index,
            frequency,
            labels,
            filtered,
            min_frequency,
        })
    }

    /// Absorb class `b` into class `a`.
    ///
    /// Every filtered token labelled `b` is relabelled `a`. Returns the
    /// number of tokens that moved; zero when `b` is not a live filtered
    /// class or `a == b`.
    pub fn merge(&mut self, a: ClassId, b: ClassId) -> usize {
        if a == b {
            return 0;
        }
        let mut moved = 0;
        for (label, &filtered) in self.labels.iter_mut().zip(&self.filtered) {
            if filtered && *label == b {
                *label = a;
                moved += 1;
            }
        }
        moved
    }

    /// [`merge`](Self::merge) addressed by label strings.
    pub fn merge_labels(&mut self, a: &str, b: &str) -> Result<usize> {
        let a = self.require(a)?;
        let b = self.require(b)?;
        Ok(self.merge(a, b))
    }

    /// Id of a token, if it is in the vocabulary.
    pub fn token_id(&self, token: &str) -> Option<TokenId> {
        self.index.get(token).copied()
    }

    fn require(&self, token: &str) -> Result<TokenId> {
        self.token_id(token).ok_or_else(|| Error::UnknownToken(token.to_string()))
    }

    /// Token string for an id.
    ///
    /// # Panics
    ///
    /// Panics if `id` is out of range.
    pub fn token(&self, id: TokenId) -> &str {
        &self.vocab[id]
    }

    /// Current class of a token id.
    pub fn class_of(&self, id: TokenId) -> ClassId {
        self.labels[id]
    }

    /// Current class label of a token string.
    pub fn label_of(&self, token: &str) -> Option<&str> {
        self.token_id(token).map(|id| self.vocab[self.labels[id]].as_str())
    }

    /// Corpus frequency of a token id.
    pub fn frequency(&self, id: TokenId) -> usize {
        self.frequency[id]
    }

    /// Whether a token passed the frequency filter.
    pub fn is_filtered(&self, id: TokenId) -> bool {
        self.filtered[id]
    }

    /// Frequency threshold the filter was built with.
    pub fn min_frequency(&self) -> usize {
        self.min_frequency
    }

    /// Number of distinct tokens.
    pub fn n_tokens(&self) -> usize {
        self.vocab.len()
    }

    /// Whether `class` currently labels any token.
    ///
    /// A label is live exactly when its own token still carries it, since
    /// a token only loses its label when that label is absorbed.
    pub fn is_live(&self, class: ClassId) -> bool {
        self.labels.get(class) == Some(&class)
    }

    /// All live class labels (filtered or not), in first-appearance order.
    pub fn live_classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        (0..self.vocab.len()).filter(move |&c| self.labels[c] == c)
    }

    /// Live filtered classes, in first-appearance order.
    pub fn filtered_classes(&self) -> Vec<ClassId> {
        (0..self.vocab.len())
            .filter(|&c| self.filtered[c] && self.labels[c] == c)
            .collect()
    }

    /// Number of distinct labels among filtered tokens.
    pub fn n_classes(&self) -> usize {
        self.labels
            .iter()
            .zip(&self.filtered)
            .filter(|(_, filtered)| **filtered)
            .map(|(&label, _)| label)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Token ids currently in `class`, in first-appearance order.
    pub fn members(&self, class: ClassId) -> Vec<TokenId> {
        (0..self.vocab.len())
            .filter(|&t| self.labels[t] == class)
            .collect()
    }

    /// Filtered tokens with their class labels, in first-appearance order.
    pub fn filtered_entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        (0..self.vocab.len())
            .filter(move |&t| self.filtered[t])
            .map(move |t| (self.vocab[t].as_str(), self.vocab[self.labels[t]].as_str()))
    }

    /// Every token with its class label, in first-appearance order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.vocab
            .iter()
            .zip(&self.labels)
            .map(move |(t, &l)| (t.as_str(), self.vocab[l].as_str()))
    }

    /// Label-free view of the filtered partition.
    ///
    /// Each block lists its filtered token ids ascending; blocks are sorted
    /// by their first member. Two maps with equal partitions compare equal
    /// here regardless of which label each class carries.
    pub fn partition(&self) -> Vec<Vec<TokenId>> {
        let mut blocks: HashMap<ClassId, Vec<TokenId>> = HashMap::new();
        for t in (0..self.vocab.len()).filter(|&t| self.filtered[t]) {
            blocks.entry(self.labels[t]).or_default().push(t);
        }
        let mut blocks: Vec<Vec<TokenId>> = blocks.into_values().collect();
        blocks.sort_unstable_by_key(|b| b[0]);
        blocks
    }
}
