//! Greedy class-bigram clustering (Brown et al. 1992).
//!
//! Start with one class per frequent token and repeatedly merge the pair of
//! classes whose merge loses the least average mutual information, until
//! the target number of classes remains.
//!
//! ```text
//! tokens ──► pairs (fixed) ──► counts ──► q, s ──► L ──► argmin ──► merge
//!                                ▲                                    │
//!                                └────────────── class map ◄──────────┘
//! ```
//!
//! The first step evaluates the full loss table (O(k³)); later steps
//! recount the corpus under the new class map (O(pairs)) and patch the
//! table (see [`crate::loss`]).
//!
//! # Example
//!
//! ```rust
//! use wordclass::BrownClustering;
//!
//! let tokens = ["a", "b", "a", "b", "c", "a", "b", "c", "d"].repeat(10);
//! let outcome = BrownClustering::new(1)
//!     .with_min_frequency(2)
//!     .fit(&tokens)
//!     .unwrap();
//!
//! assert_eq!(outcome.history.len(), 3);
//! assert_eq!(outcome.class_map.n_classes(), 1);
//! ```

use crate::class_map::{ClassId, ClassMap};
use crate::counts::TokenPairs;
use crate::error::{Error, Result};
use crate::history::{MergeHistory, MergeRecord};
use crate::loss::{ClassPair, LossTable};
use crate::pmi::{Statistics, FULL_PASS_EPSILON};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// Configuration for a clustering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrownConfig {
    /// Tokens occurring fewer times than this never merge.
    pub min_frequency: usize,
    /// Stop when this many filtered classes remain.
    pub n_classes: usize,
    /// Capture the class map the first time exactly this many classes remain.
    pub snapshot_at: Option<usize>,
    /// Upper bound on merge steps, if any.
    pub max_merges: Option<usize>,
}

impl Default for BrownConfig {
    fn default() -> Self {
        Self {
            min_frequency: 10,
            n_classes: 1,
            snapshot_at: Some(15),
            max_merges: None,
        }
    }
}

impl BrownConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings for part-of-speech tag sequences (threshold 5).
    pub fn tagged() -> Self {
        Self {
            min_frequency: 5,
            ..Self::default()
        }
    }

    /// Set the frequency threshold.
    pub fn with_min_frequency(mut self, min_frequency: usize) -> Self {
        self.min_frequency = min_frequency;
        self
    }

    /// Set the target number of classes.
    pub fn with_n_classes(mut self, n_classes: usize) -> Self {
        self.n_classes = n_classes;
        self
    }

    /// Set (or disable) the snapshot class count.
    pub fn with_snapshot_at(mut self, snapshot_at: Option<usize>) -> Self {
        self.snapshot_at = snapshot_at;
        self
    }

    /// Cap the number of merges.
    pub fn with_max_merges(mut self, max_merges: usize) -> Self {
        self.max_merges = Some(max_merges);
        self
    }

    /// Parse a configuration from JSON; missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Result of a clustering run.
#[derive(Debug, Clone)]
pub struct ClusteringOutcome {
    /// Class map when the loop stopped.
    pub class_map: ClassMap,
    /// Class map at the snapshot class count, if the run passed through it.
    pub snapshot: Option<ClassMap>,
    /// Every merge, in order.
    pub history: MergeHistory,
}

/// Step-by-step merge state.
///
/// Holds the class map together with the tables describing it. The tables
/// always match the current class map: every [`step`](Self::step) merges
/// and then brings counts, scores and losses up to date.
#[derive(Debug, Clone)]
pub struct MergeEngine {
    pairs: TokenPairs,
    class_map: ClassMap,
    stats: Statistics,
    losses: LossTable,
    steps: usize,
}

impl MergeEngine {
    /// Build the initial state with a full loss pass.
    pub fn new<S: AsRef<str>>(tokens: &[S], min_frequency: usize) -> Result<Self> {
        let class_map = ClassMap::from_tokens(tokens, min_frequency)?;
        let classes = class_map.filtered_classes();
        if classes.len() < 2 {
            return Err(Error::TooFewClasses {
                found: classes.len(),
                min_frequency,
            });
        }

        let pairs = TokenPairs::encode(&class_map, tokens)?;
        let stats = Statistics::compute(&pairs, &class_map);
        trace!(
            bigrams = stats.counts.n_bigrams(),
            classes = classes.len(),
            "initial tables"
        );
        let losses = LossTable::full(&stats, classes, FULL_PASS_EPSILON);

        Ok(Self {
            pairs,
            class_map,
            stats,
            losses,
            steps: 0,
        })
    }

    /// Current class map.
    pub fn class_map(&self) -> &ClassMap {
        &self.class_map
    }

    /// Tables for the current class map.
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Loss table for the current class map.
    pub fn losses(&self) -> &LossTable {
        &self.losses
    }

    /// Live filtered classes.
    pub fn n_classes(&self) -> usize {
        self.losses.classes().len()
    }

    /// Merges performed so far.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// The merge [`step`](Self::step) would perform.
    pub fn best_merge(&self) -> Option<(ClassPair, f64)> {
        self.losses.best()
    }

    /// Loss table recomputed from scratch for the current state.
    pub fn reference_losses(&self) -> LossTable {
        LossTable::full(&self.stats, self.class_map.filtered_classes(), FULL_PASS_EPSILON)
    }

    /// Perform the cheapest merge. `None` once a single class remains.
    pub fn step(&mut self) -> Option<MergeRecord> {
        let (pair, loss) = self.losses.best()?;
        self.apply(pair, loss);
        Some(MergeRecord {
            step: self.steps - 1,
            survivor: self.class_map.token(pair.first).to_string(),
            absorbed: self.class_map.token(pair.second).to_string(),
            loss,
            n_classes: self.n_classes(),
        })
    }

    fn apply(&mut self, pair: ClassPair, loss: f64) {
        let (a, b) = (pair.first, pair.second);
        let moved = self.class_map.merge(a, b);
        debug_assert!(moved > 0, "absorbed class {b} was not live");

        let next = self.stats.after_merge(&self.pairs, &self.class_map, a, b);
        let classes = self.class_map.filtered_classes();
        self.losses = self.losses.update(&self.stats, &next, classes, pair);
        trace!(
            bigrams = next.counts.n_bigrams(),
            pairs = self.losses.len(),
            "tables updated"
        );
        self.stats = next;

        debug!(
            step = self.steps,
            survivor = self.class_map.token(a),
            absorbed = self.class_map.token(b),
            loss,
            remaining = self.losses.classes().len(),
            "merged classes"
        );
        self.steps += 1;
    }

    fn labels(&self, classes: &[ClassId]) -> Vec<String> {
        classes
            .iter()
            .map(|&c| self.class_map.token(c).to_string())
            .collect()
    }
}

/// Brown clustering driver.
#[derive(Debug, Clone, Default)]
pub struct BrownClustering {
    config: BrownConfig,
}

impl BrownClustering {
    /// Cluster down to `n_classes` with default settings otherwise.
    pub fn new(n_classes: usize) -> Self {
        Self {
            config: BrownConfig::default().with_n_classes(n_classes),
        }
    }

    /// Use an explicit configuration.
    pub fn from_config(config: BrownConfig) -> Self {
        Self { config }
    }

    /// Set the frequency threshold.
    pub fn with_min_frequency(mut self, min_frequency: usize) -> Self {
        self.config.min_frequency = min_frequency;
        self
    }

    /// Set (or disable) the snapshot class count.
    pub fn with_snapshot_at(mut self, snapshot_at: Option<usize>) -> Self {
        self.config.snapshot_at = snapshot_at;
        self
    }

    /// Cap the number of merges.
    pub fn with_max_merges(mut self, max_merges: usize) -> Self {
        self.config.max_merges = Some(max_merges);
        self
    }

    /// Configuration in effect.
    pub fn config(&self) -> &BrownConfig {
        &self.config
    }

    /// Cluster `tokens`.
    pub fn fit<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ClusteringOutcome> {
        self.fit_with_observer(tokens, |_, _| {})
    }

    /// Cluster `tokens`, calling `observer` after every merge.
    pub fn fit_with_observer<S, F>(
        &self,
        tokens: &[S],
        mut observer: F,
    ) -> Result<ClusteringOutcome>
    where
        S: AsRef<str>,
        F: FnMut(&MergeRecord, &ClassMap),
    {
        let target = self.config.n_classes;
        if target == 0 {
            return Err(Error::InvalidParameter {
                name: "n_classes",
                message: "must be at least 1",
            });
        }

        let mut engine = MergeEngine::new(tokens, self.config.min_frequency)?;
        let available = engine.n_classes();
        if target >= available {
            return Err(Error::InvalidClassCount {
                requested: target,
                available,
            });
        }

        info!(
            tokens = tokens.len(),
            vocabulary = engine.class_map().n_tokens(),
            classes = available,
            target_classes = target,
            "starting clustering"
        );

        let leaves = engine.labels(engine.losses().classes());
        let mut history = MergeHistory::new(leaves);
        let mut snapshot = self.snapshot_if_due(&engine, None);
        let max_merges = self.config.max_merges.unwrap_or(usize::MAX);

        while engine.n_classes() > target && history.len() < max_merges {
            let Some(record) = engine.step() else {
                break;
            };
            observer(&record, engine.class_map());
            snapshot = self.snapshot_if_due(&engine, snapshot);
            history.push(record);
        }

        info!(
            merges = history.len(),
            classes = engine.n_classes(),
            total_loss = history.total_loss(),
            ami = engine.statistics().ami(),
            snapshot = snapshot.is_some(),
            "clustering complete"
        );

        Ok(ClusteringOutcome {
            class_map: engine.class_map,
            snapshot,
            history,
        })
    }

    fn snapshot_if_due(
        &self,
        engine: &MergeEngine,
        current: Option<ClassMap>,
    ) -> Option<ClassMap> {
        if current.is_some() {
            return current;
        }
        match self.config.snapshot_at {
            Some(k) if k == engine.n_classes() => Some(engine.class_map().clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<&'static str> {
        ["a", "b", "a", "b", "c", "a", "b", "c", "d"].repeat(10)
    }

    #[test]
    fn test_config_default() {
        let config = BrownConfig::default();
        assert_eq!(config.min_frequency, 10);
        assert_eq!(config.n_classes, 1);
        assert_eq!(config.snapshot_at, Some(15));
        assert_eq!(BrownConfig::tagged().min_frequency, 5);
    }

    #[test]
    fn test_config_from_json_fills_defaults() {
        let config = BrownConfig::from_json(r#"{"n_classes": 15}"#).unwrap();
        assert_eq!(config, BrownConfig::new().with_n_classes(15));
        for malformed in ["{", r#"{"n_classes": "x"}"#, r#"{"snapshot_at": -1}"#] {
            assert!(
                matches!(BrownConfig::from_json(malformed), Err(Error::Serialization(_))),
                "{malformed}"
            );
        }
    }

    #[test]
    fn test_engine_tables_track_class_map() {
        let mut engine = MergeEngine::new(&corpus(), 2).unwrap();
        assert_eq!(engine.n_classes(), 4);

        let record = engine.step().unwrap();
        assert_eq!(record.step, 0);
        assert_eq!(record.n_classes, 3);
        assert_eq!(engine.class_map().n_classes(), 3);
        assert_eq!(engine.losses().len(), 3);

        let fresh = Statistics::compute(&engine.pairs, engine.class_map());
        assert_eq!(engine.statistics().counts, fresh.counts);
    }

    #[test]
    fn test_engine_stops_at_one_class() {
        let mut engine = MergeEngine::new(&corpus(), 2).unwrap();
        let mut merges = 0;
        while engine.step().is_some() {
            merges += 1;
        }
        assert_eq!(merges, 3);
        assert_eq!(engine.steps(), 3);
        assert_eq!(engine.best_merge(), None);
    }

    #[test]
    fn test_too_few_classes() {
        let err = BrownClustering::new(1)
            .with_min_frequency(1000)
            .fit(&corpus())
            .unwrap_err();
        assert_eq!(
            err,
            Error::TooFewClasses {
                found: 0,
                min_frequency: 1000
            }
        );
        assert!(err.is_configuration());
    }

    #[test]
    fn test_target_not_below_available() {
        let err = BrownClustering::new(4)
            .with_min_frequency(2)
            .fit(&corpus())
            .unwrap_err();
        assert_eq!(
            err,
            Error::InvalidClassCount {
                requested: 4,
                available: 4
            }
        );
        assert!(BrownClustering::new(0).fit(&corpus()).is_err());
    }

    #[test]
    fn test_empty_input() {
        let tokens: Vec<String> = Vec::new();
        assert_eq!(
            BrownClustering::new(1).fit(&tokens).unwrap_err(),
            Error::EmptyInput
        );
    }

    #[test]
    fn test_max_merges() {
        let outcome = BrownClustering::new(1)
            .with_min_frequency(2)
            .with_max_merges(2)
            .fit(&corpus())
            .unwrap();
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.class_map.n_classes(), 2);
    }

    #[test]
    fn test_observer_sees_every_merge() {
        let mut seen = Vec::new();
        let outcome = BrownClustering::new(1)
            .with_min_frequency(2)
            .fit_with_observer(&corpus(), |record, map| {
                seen.push((record.step, map.n_classes()));
            })
            .unwrap();
        assert_eq!(seen, vec![(0, 3), (1, 2), (2, 1)]);
        assert_eq!(outcome.history.len(), 3);
    }

    #[test]
    fn test_snapshot_at_intermediate_count() {
        let outcome = BrownClustering::new(1)
            .with_min_frequency(2)
            .with_snapshot_at(Some(2))
            .fit(&corpus())
            .unwrap();
        let snapshot = outcome.snapshot.unwrap();
        assert_eq!(snapshot.n_classes(), 2);
        assert_eq!(
            snapshot.partition(),
            ClassMap::from_tokens(&corpus(), 2)
                .map(|mut m| {
                    for r in outcome.history.iter().take(2) {
                        m.merge_labels(&r.survivor, &r.absorbed).unwrap();
                    }
                    m.partition()
                })
                .unwrap()
        );
    }

    #[test]
    fn test_snapshot_missing_when_never_reached() {
        // Only four classes: fifteen is never passed through.
        let outcome = BrownClustering::new(1)
            .with_min_frequency(2)
            .fit(&corpus())
            .unwrap();
        assert!(outcome.snapshot.is_none());
    }

    #[test]
    fn test_snapshot_of_initial_state() {
        let outcome = BrownClustering::new(1)
            .with_min_frequency(2)
            .with_snapshot_at(Some(4))
            .fit(&corpus())
            .unwrap();
        assert_eq!(outcome.snapshot.unwrap().n_classes(), 4);
    }
}
