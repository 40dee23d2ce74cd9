//! Exact versus approximate distinct counting over a replayable token stream.
//!
//! [`run`] consumes the source twice: once into an exact in-memory set, once
//! into a [`CardinalityEstimator`], timing each pass.

use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

use hashbrown::HashSet;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;

use crate::error::Result;
use crate::estimator::{validate_precision, CardinalityEstimator};
use crate::source::TokenSource;

/// Precision used when none is configured
pub const DEFAULT_PRECISION: u8 = 14;

/// Outcome of one benchmark run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchmarkReport {
    pub exact_count: u64,
    pub exact_elapsed: Duration,
    pub estimated_count: f64,
    pub estimated_elapsed: Duration,
}

impl BenchmarkReport {
    /// Relative error of the estimate in percent, `0` when nothing was counted
    pub fn relative_error_percent(&self) -> f64 {
        if self.exact_count == 0 {
            return 0.0;
        }
        let exact = self.exact_count as f64;
        (self.estimated_count - exact).abs() / exact * 100.0
    }
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "")]
    metric: &'static str,
    #[tabled(rename = "Exact")]
    exact: String,
    #[tabled(rename = "HyperLogLog")]
    estimated: String,
}

impl Display for BenchmarkReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let rows = [
            ReportRow {
                metric: "Unique elements",
                exact: format!("{:.1}", self.exact_count as f64),
                estimated: format!("{:.2}", self.estimated_count),
            },
            ReportRow {
                metric: "Elapsed (s)",
                exact: format!("{:.2}", self.exact_elapsed.as_secs_f64()),
                estimated: format!("{:.2}", self.estimated_elapsed.as_secs_f64()),
            },
            ReportRow {
                metric: "Error (%)",
                exact: "-".to_string(),
                estimated: format!("{:.2}", self.relative_error_percent()),
            },
        ];

        let mut table = Table::new(rows);
        table.with(Style::markdown());
        write!(f, "{}", table)
    }
}

/// Count distinct tokens exactly
pub fn exact_unique_count<I>(tokens: I) -> u64
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut seen: HashSet<String> = HashSet::new();
    for token in tokens {
        let token = token.as_ref();
        if !seen.contains(token) {
            seen.insert(token.to_owned());
        }
    }
    seen.len() as u64
}

/// Estimate distinct tokens with a `2^precision` register estimator
pub fn estimate_unique_count<I>(tokens: I, precision: u8) -> Result<f64>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut estimator = CardinalityEstimator::new(precision)?;
    for token in tokens {
        estimator.update(token.as_ref());
    }
    Ok(estimator.estimate())
}

/// Run the exact pass and then the estimator pass over `source`.
///
/// `precision` is validated before the first pass starts.
pub fn run<S>(source: &S, precision: u8) -> Result<BenchmarkReport>
where
    S: TokenSource + ?Sized,
{
    validate_precision(precision)?;

    let started = Instant::now();
    let exact_count = exact_unique_count(source.tokens()?);
    let exact_elapsed = started.elapsed();
    info!(exact_count, ?exact_elapsed, "exact pass finished");

    let started = Instant::now();
    let estimated_count = estimate_unique_count(source.tokens()?, precision)?;
    let estimated_elapsed = started.elapsed();
    info!(estimated_count, ?estimated_elapsed, precision, "estimator pass finished");

    Ok(BenchmarkReport {
        exact_count,
        exact_elapsed,
        estimated_count,
        estimated_elapsed,
    })
}
