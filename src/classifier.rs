//! Streaming uniqueness classification on top of a [`MembershipFilter`].
//!
//! Every candidate is labelled [`Status::Invalid`], [`Status::Duplicate`] or
//! [`Status::Unique`]. Invalid candidates (absent, non-text, empty or
//! whitespace-only) never touch the filter.
//!
//! ```
//! use probcount::classifier::{classify, Status};
//! use probcount::filter::MembershipFilter;
//!
//! let mut filter = MembershipFilter::new(1000, 3).unwrap();
//! filter.insert("password123").unwrap();
//!
//! let results = classify(&mut filter, ["password123", "guest", "  "], false);
//! assert_eq!(results["password123"], Status::Duplicate);
//! assert_eq!(results["guest"], Status::Unique);
//! assert_eq!(results["  "], Status::Invalid);
//! ```

use std::borrow::Cow;
use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use tracing::trace;

use crate::filter::MembershipFilter;

/// Map key used for [`Candidate::Absent`]
pub const ABSENT_KEY: &str = "None";

/// Classification result in candidate processing order
pub type Classification = IndexMap<String, Status>;

/// Status of a single candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Invalid,
    Duplicate,
    Unique,
}

impl Display for Status {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Status::Invalid => "invalid",
            Status::Duplicate => "duplicate",
            Status::Unique => "unique",
        })
    }
}

/// A value presented for classification
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate<'a> {
    /// Missing value
    Absent,
    /// Text value
    Text(Cow<'a, str>),
    /// Non-text value, carried by its display form
    Other(String),
}

impl Candidate<'_> {
    /// Key under which the candidate is recorded
    pub fn key(&self) -> &str {
        match self {
            Candidate::Absent => ABSENT_KEY,
            Candidate::Text(text) => text.as_ref(),
            Candidate::Other(repr) => repr.as_str(),
        }
    }

    /// Text usable as a filter item, if any
    fn valid_text(&self) -> Option<&str> {
        match self {
            Candidate::Text(text) if !text.trim().is_empty() => Some(text.as_ref()),
            _ => None,
        }
    }
}

impl<'a> From<&'a str> for Candidate<'a> {
    fn from(text: &'a str) -> Self {
        Candidate::Text(Cow::Borrowed(text))
    }
}

impl<'a> From<&'a String> for Candidate<'a> {
    fn from(text: &'a String) -> Self {
        Candidate::Text(Cow::Borrowed(text))
    }
}

impl From<String> for Candidate<'_> {
    fn from(text: String) -> Self {
        Candidate::Text(Cow::Owned(text))
    }
}

impl<'a, T: Into<Candidate<'a>>> From<Option<T>> for Candidate<'a> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Candidate::Absent, Into::into)
    }
}

macro_rules! impl_from_non_text {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Candidate<'_> {
                fn from(value: $ty) -> Self {
                    Candidate::Other(value.to_string())
                }
            }
        )*
    };
}

impl_from_non_text!(char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl From<bool> for Candidate<'_> {
    fn from(value: bool) -> Self {
        Candidate::Other(if value { "True" } else { "False" }.to_string())
    }
}

macro_rules! impl_from_float {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Candidate<'_> {
                /// Integral values keep a trailing `.0`
                fn from(value: $ty) -> Self {
                    Candidate::Other(format!("{value:?}"))
                }
            }
        )*
    };
}

impl_from_float!(f32, f64);

/// Classify `candidates` against `filter` in input order.
///
/// With `add_unique`, every unique candidate is inserted right away, so a
/// later repeat within the same batch is reported as duplicate. A later
/// candidate sharing a key with an earlier one overwrites its status while
/// keeping the original position.
pub fn classify<'a, I>(
    filter: &mut MembershipFilter,
    candidates: I,
    add_unique: bool,
) -> Classification
where
    I: IntoIterator,
    I::Item: Into<Candidate<'a>>,
{
    let mut results = Classification::new();

    for candidate in candidates {
        let candidate = candidate.into();
        let status = match candidate.valid_text() {
            None => Status::Invalid,
            Some(text) if filter.query_unchecked(text) => Status::Duplicate,
            Some(text) => {
                if add_unique {
                    filter.insert_unchecked(text);
                }
                Status::Unique
            }
        };

        trace!(key = candidate.key(), %status, "classified candidate");
        results.insert(candidate.key().to_owned(), status);
    }

    results
}
