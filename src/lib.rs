//! # wordclass
//!
//! Word class induction by greedy mutual-information clustering
//! (Brown et al. 1992).
//!
//! Every frequent token starts in its own class. At each step the two
//! classes whose merge loses the least average mutual information (AMI) of
//! the class bigram model are merged, until the requested number of classes
//! remains. Per-class scores and the pairwise loss table are patched
//! between steps instead of being recomputed, which takes a step from
//! O(k³) to O(k²).
//!
//! ```rust
//! use wordclass::{report, BrownClustering};
//!
//! let tokens = ["a", "b", "a", "b", "c", "a", "b", "c", "d"].repeat(10);
//! let outcome = BrownClustering::new(2)
//!     .with_min_frequency(2)
//!     .fit(&tokens)?;
//!
//! assert_eq!(outcome.class_map.n_classes(), 2);
//! println!("{}", report::render_history(&outcome.history));
//! # Ok::<(), wordclass::Error>(())
//! ```
//!
//! The [`collocation`] module holds an independent PMI ranking of word
//! pairs.

pub mod brown;
pub mod class_map;
pub mod collocation;
pub mod counts;
/// Error types used across `wordclass`.
pub mod error;
pub mod history;
pub mod loss;
pub mod pmi;
pub mod report;


pub use brown::{BrownClustering, BrownConfig, ClusteringOutcome, MergeEngine};
pub use class_map::{ClassId, ClassMap, TokenId};
pub use collocation::{pmi_report, PairMode, PairScore, PmiReportConfig};
pub use counts::{ClassCounts, TokenPairs};
pub use error::{Error, Result};
pub use history::{MergeHistory, MergeRecord};
pub use loss::{ClassPair, LossTable};
pub use pmi::{PmiTable, Scores, Statistics};
