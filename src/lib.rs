//! `probcount` answers two questions over large or streaming datasets at sub-linear memory cost:
//! "have I seen this item before?" with a fixed-size bit-vector [`MembershipFilter`], and
//! "how many distinct items have I seen?" with a HyperLogLog [`CardinalityEstimator`].
//!
//! On top of them, [`classifier`] labels candidate batches as unique, duplicate or invalid, and
//! [`benchmark`] compares exact and approximate distinct counts over a replayable token stream.
pub mod benchmark;
pub mod classifier;
pub mod error;
pub mod estimator;
pub mod filter;
pub mod source;

pub use error::{Error, Result};
pub use estimator::CardinalityEstimator;
pub use filter::MembershipFilter;
