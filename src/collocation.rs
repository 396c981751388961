//! Word-pair PMI report.
//!
//! Ranks token pairs by pointwise mutual information:
//!
//! ```text
//! PMI(x, y) = log₂( P(x, y) / (P(x) × P(y)) )
//! ```
//!
//! `P(x, y)` is relative to every generated pair and `P(x)` to every token,
//! so the filter only decides which pairs are *reported*, not the
//! denominators.
//!
//! Two pair populations are supported:
//!
//! | Mode | Pairs `(wᵢ, wⱼ)` |
//! |------|-------------------|
//! | [`PairMode::Consecutive`] | `j = i + 1` |
//! | [`PairMode::Distant`] | `2 ≤ |i − j| ≤ window`, both directions |
//!
//! This is independent from the clustering engine and much cheaper.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How pairs are drawn from the token sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PairMode {
    /// Adjacent tokens.
    Consecutive,
    /// Tokens at least two and at most `window` positions apart.
    Distant {
        /// Largest distance considered.
        window: usize,
    },
}

impl PairMode {
    /// Distant pairs within the default 50-token window.
    pub fn distant() -> Self {
        PairMode::Distant { window: 50 }
    }
}

/// A ranked token pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairScore {
    /// First token.
    pub first: String,
    /// Second token.
    pub second: String,
    /// Number of occurrences of the pair.
    pub count: u64,
    /// PMI in bits.
    pub pmi: f64,
}

/// Configuration for [`pmi_report`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PmiReportConfig {
    /// Pair population.
    pub mode: PairMode,
    /// Both tokens of a reported pair must occur at least this often.
    pub min_frequency: usize,
    /// Number of pairs to report.
    pub top_k: usize,
}

impl Default for PmiReportConfig {
    fn default() -> Self {
        Self {
            mode: PairMode::Consecutive,
            min_frequency: 10,
            top_k: 20,
        }
    }
}

impl PmiReportConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pair mode.
    pub fn with_mode(mut self, mode: PairMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the frequency filter.
    pub fn with_min_frequency(mut self, min_frequency: usize) -> Self {
        self.min_frequency = min_frequency;
        self
    }

    /// Set the number of reported pairs.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }
}

/// Top pairs of `tokens` by PMI, highest first.
///
/// Pairs with equal PMI keep the order in which they first occurred.
///
/// # Example
///
/// ```rust
/// use wordclass::collocation::{pmi_report, PmiReportConfig};
///
/// let tokens = ["x", "y", "x", "y", "x", "y"];
/// let top = pmi_report(&tokens, &PmiReportConfig::new().with_min_frequency(1)).unwrap();
///
/// assert_eq!((top[0].first.as_str(), top[0].second.as_str()), ("x", "y"));
/// assert!((top[0].pmi - (0.6f64 / 0.25).log2()).abs() < 1e-12);
/// ```
pub fn pmi_report<S: AsRef<str>>(
    tokens: &[S],
    config: &PmiReportConfig,
) -> Result<Vec<PairScore>> {
    if tokens.is_empty() {
        return Err(Error::EmptyInput);
    }
    if config.top_k == 0 {
        return Err(Error::InvalidParameter {
            name: "top_k",
            message: "must be at least 1",
        });
    }
    if let PairMode::Distant { window } = config.mode {
        if window < 2 {
            return Err(Error::InvalidParameter {
                name: "window",
                message: "distant pairs need a window of at least 2",
            });
        }
    }

    let words: Vec<&str> = tokens.iter().map(|t| t.as_ref()).collect();
    let mut freq: HashMap<&str, u64> = HashMap::new();
    for &w in &words {
        *freq.entry(w).or_insert(0) += 1;
    }
    let frequent = |w: &str| freq[w] as usize >= config.min_frequency;

    let mut counter = PairCounter::default();
    let n = words.len();
    let total_pairs: u64 = match config.mode {
        PairMode::Consecutive => {
            for w in words.windows(2) {
                if frequent(w[0]) && frequent(w[1]) {
                    counter.add(w[0], w[1]);
                }
            }
            n.saturating_sub(1) as u64
        }
        PairMode::Distant { window } => {
            let mut total = 0u64;
            for i in 0..n {
                let before = i.saturating_sub(window)..i.saturating_sub(1);
                let after = (i + 2)..n.min(i + window + 1);
                for j in before.chain(after) {
                    total += 1;
                    if frequent(words[i]) && frequent(words[j]) {
                        counter.add(words[i], words[j]);
                    }
                }
            }
            total
        }
    };

    let n_words = n as f64;
    let n_pairs = total_pairs as f64;
    let mut scored: Vec<PairScore> = counter
        .into_ordered()
        .into_iter()
        .map(|((first, second), count)| {
            let p_xy = count as f64 / n_pairs;
            let p_x = freq[first] as f64 / n_words;
            let p_y = freq[second] as f64 / n_words;
            PairScore {
                first: first.to_string(),
                second: second.to_string(),
                count,
                pmi: (p_xy / (p_x * p_y)).log2(),
            }
        })
        .collect();

    // Stable: equal scores keep first-occurrence order.
    scored.sort_by(|a, b| b.pmi.total_cmp(&a.pmi));
    scored.truncate(config.top_k);
    Ok(scored)
}

/// Pair counts that remember first-occurrence order.
#[derive(Default)]
struct PairCounter<'a> {
    index: HashMap<(&'a str, &'a str), usize>,
    counts: Vec<((&'a str, &'a str), u64)>,
}

impl<'a> PairCounter<'a> {
    fn add(&mut self, x: &'a str, y: &'a str) {
        match self.index.get(&(x, y)) {
            Some(&i) => self.counts[i].1 += 1,
            None => {
                self.index.insert((x, y), self.counts.len());
                self.counts.push(((x, y), 1));
            }
        }
    }

    fn into_ordered(self) -> Vec<((&'a str, &'a str), u64)> {
        self.counts
    }
}
