//! Fixed-size bit-vector membership filter.
//!
//! The filter answers "have I seen this item before?" with no false negatives
//! and a false-positive probability that grows with its load factor.
//!
//! # Probe positions
//!
//! Each item is encoded as UTF-8 and hashed twice:
//! - `h1` - SHA-256 digest read as a 256-bit unsigned big-endian integer.
//! - `h2` - MD5 digest read as a 128-bit unsigned big-endian integer,
//!   forced to `1` when the digest is all zeros.
//!
//! Probe `i` in `[0, num_probes)` lands on bit `(h1 + i * h2) mod size`.
//! Both digests are reduced modulo `size` first, which keeps the arithmetic
//! in `u128` while producing exactly the same positions.
//!
//! # Bit storage
//!
//! Bits are packed into `u64` words, bit `pos` living at word `pos / 64`,
//! offset `pos % 64`. The word vector is the smallest one covering `size` bits.

use std::fmt::{Debug, Formatter};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};

const WORD_BITS: usize = u64::BITS as usize;

pub struct MembershipFilter {
    /// Packed bit vector
    bits: Vec<u64>,
    /// Number of addressable bit positions
    size: usize,
    /// Number of probe positions derived per item
    num_probes: usize,
}

impl MembershipFilter {
    /// Creates an empty filter with `size` bits and `num_probes` probes per item.
    ///
    /// Fails with [`Error::InvalidArgument`] when either parameter is zero.
    pub fn new(size: usize, num_probes: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::invalid_argument("size", "must be a positive integer"));
        }
        if num_probes == 0 {
            return Err(Error::invalid_argument(
                "num_probes",
                "must be a positive integer",
            ));
        }

        debug!(size, num_probes, "created membership filter");
        Ok(Self {
            bits: vec![0u64; size.div_ceil(WORD_BITS)],
            size,
            num_probes,
        })
    }

    /// Sets every probe position of `item`. Inserting the same item again is a no-op.
    pub fn insert(&mut self, item: &str) -> Result<()> {
        check_item(item)?;
        self.insert_unchecked(item);
        Ok(())
    }

    /// Returns `true` if every probe position of `item` is set.
    ///
    /// `false` is definitive; `true` may be a false positive.
    pub fn query(&self, item: &str) -> Result<bool> {
        check_item(item)?;
        Ok(self.query_unchecked(item))
    }

    /// Returns the probe positions derived for `item`, in probe order.
    pub fn positions(&self, item: &str) -> Result<Vec<usize>> {
        check_item(item)?;
        Ok(self.probes(item).collect())
    }

    pub(crate) fn insert_unchecked(&mut self, item: &str) {
        for pos in self.probes(item) {
            self.bits[pos / WORD_BITS] |= 1u64 << (pos % WORD_BITS);
        }
    }

    pub(crate) fn query_unchecked(&self, item: &str) -> bool {
        self.probes(item)
            .all(|pos| self.bits[pos / WORD_BITS] & (1u64 << (pos % WORD_BITS)) != 0)
    }

    fn probes(&self, item: &str) -> Probes {
        Probes::new(item.as_bytes(), self.size, self.num_probes)
    }

    /// Number of addressable bit positions
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of probe positions per item
    pub fn num_probes(&self) -> usize {
        self.num_probes
    }

    /// Number of bits set to 1
    pub fn bits_set(&self) -> usize {
        self.bits.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Ratio of set bits to total bits
    pub fn load_factor(&self) -> f64 {
        self.bits_set() as f64 / self.size as f64
    }

    /// False positive probability implied by the current load factor,
    /// `load_factor ^ num_probes`.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        let probes = i32::try_from(self.num_probes).unwrap_or(i32::MAX);
        self.load_factor().powi(probes)
    }

    /// Memory size of the filter in bytes
    pub fn size_of(&self) -> usize {
        std::mem::size_of::<Self>() + std::mem::size_of_val(self.bits.as_slice())
    }
}

impl Debug for MembershipFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ size: {}, num_probes: {}, bits_set: {} }}",
            self.size,
            self.num_probes,
            self.bits_set()
        )
    }
}

/// Empty strings are rejected before any bit is touched.
#[inline]
fn check_item(item: &str) -> Result<()> {
    if item.is_empty() {
        return Err(Error::TypeInvalid("item must be a non-empty string"));
    }
    Ok(())
}

/// Iterator over the double-hashing probe positions of one item.
struct Probes {
    h1: u128,
    h2: u128,
    size: u128,
    probe: usize,
    num_probes: usize,
}

impl Probes {
    fn new(bytes: &[u8], size: usize, num_probes: usize) -> Self {
        let modulus = size as u128;
        let h1 = Sha256::digest(bytes);
        let h2 = md5::compute(bytes);

        let h1 = reduce_be(h1.as_slice(), modulus);
        let h2 = if h2.iter().all(|&b| b == 0) {
            1 % modulus
        } else {
            reduce_be(h2.as_slice(), modulus)
        };

        Self {
            h1,
            h2,
            size: modulus,
            probe: 0,
            num_probes,
        }
    }
}

impl Iterator for Probes {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.probe == self.num_probes {
            return None;
        }
        // every operand is below `size` (<= 2^64), so the product fits in u128
        let i = self.probe as u128 % self.size;
        let pos = (self.h1 + i * self.h2 % self.size) % self.size;
        self.probe += 1;
        Some(pos as usize)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.num_probes - self.probe;
        (remaining, Some(remaining))
    }
}

/// Reduce a big-endian unsigned integer of arbitrary width modulo `modulus`.
#[inline]
fn reduce_be(bytes: &[u8], modulus: u128) -> u128 {
    bytes
        .iter()
        .fold(0u128, |acc, &b| ((acc << 8) | u128::from(b)) % modulus)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use test_case::test_case;

    #[test_case(0, 3 => matches Err(Error::InvalidArgument { name: "size", .. }); "zero size")]
    #[test_case(1000, 0 => matches Err(Error::InvalidArgument { name: "num_probes", .. }); "zero probes")]
    #[test_case(1, 1 => matches Ok(_); "single bit")]
    fn test_new(size: usize, num_probes: usize) -> Result<MembershipFilter> {
        MembershipFilter::new(size, num_probes)
    }

    #[test_case(1 => 1; "one bit")]
    #[test_case(64 => 1; "one full word")]
    #[test_case(65 => 2; "spills into second word")]
    #[test_case(1000 => 16; "thousand bits")]
    fn test_word_count(size: usize) -> usize {
        MembershipFilter::new(size, 3).unwrap().bits.len()
    }

    #[test]
    fn test_reduce_be() {
        // 0x0102 = 258
        assert_eq!(reduce_be(&[0x01, 0x02], 1000), 258);
        assert_eq!(reduce_be(&[0x01, 0x02], 7), 258 % 7);
        assert_eq!(reduce_be(&[0xff; 16], u128::from(u64::MAX)), 0);
        assert_eq!(reduce_be(&[], 13), 0);
    }

    /// Full-width `h1 + i * h2` as a 272-bit big-endian integer.
    fn wide_probe(h1: &[u8; 32], h2: &[u8; 16], i: u64) -> [u8; 34] {
        let mut out = [0u8; 34];
        let mut carry = 0u64;
        for k in 0..34 {
            let a = if k < 32 { u64::from(h1[31 - k]) } else { 0 };
            let b = if k < 16 { u64::from(h2[15 - k]) * i } else { 0 };
            let v = a + b + carry;
            out[33 - k] = v as u8;
            carry = v >> 8;
        }
        out
    }

    #[test_case("password123", 1000, 3)]
    #[test_case("admin123", 997, 8)]
    #[test_case("10.0.0.1", (1 << 20) + 3, 5)]
    #[test_case("ünïcödé", 12345, 4)]
    fn test_positions_match_wide_arithmetic(item: &str, size: usize, num_probes: usize) {
        let filter = MembershipFilter::new(size, num_probes).unwrap();
        let mut h1 = [0u8; 32];
        h1.copy_from_slice(&Sha256::digest(item.as_bytes()));
        let h2 = md5::compute(item.as_bytes()).0;

        let expected: Vec<usize> = (0..num_probes as u64)
            .map(|i| reduce_be(&wide_probe(&h1, &h2, i), size as u128) as usize)
            .collect();
        assert_eq!(filter.positions(item).unwrap(), expected);
    }

    #[test]
    fn test_positions_deterministic() {
        let a = MembershipFilter::new(4096, 7).unwrap();
        let b = MembershipFilter::new(4096, 7).unwrap();
        for item in ["alpha", "beta", "192.168.0.1", "пароль"] {
            let positions = a.positions(item).unwrap();
            assert_eq!(positions.len(), 7);
            assert!(positions.iter().all(|&p| p < 4096));
            assert_eq!(positions, a.positions(item).unwrap());
            assert_eq!(positions, b.positions(item).unwrap());
        }
    }

    #[test]
    fn test_first_probe_is_h1() {
        let filter = MembershipFilter::new(1 << 20, 1).unwrap();
        let h1 = reduce_be(Sha256::digest(b"abc").as_slice(), 1 << 20);
        assert_eq!(filter.positions("abc").unwrap(), vec![h1 as usize]);
    }

    #[test]
    fn test_empty_item_rejected_without_mutation() {
        let mut filter = MembershipFilter::new(100, 3).unwrap();
        assert!(matches!(filter.insert(""), Err(Error::TypeInvalid(_))));
        assert!(matches!(filter.query(""), Err(Error::TypeInvalid(_))));
        assert!(matches!(filter.positions(""), Err(Error::TypeInvalid(_))));
        assert_eq!(filter.bits_set(), 0);
    }

    #[test]
    fn test_insert_query() {
        let mut filter = MembershipFilter::new(1000, 3).unwrap();
        for item in ["password123", "admin123", "qwerty123"] {
            filter.insert(item).unwrap();
        }
        assert!(filter.query("password123").unwrap());
        assert!(filter.query("admin123").unwrap());
        assert!(filter.query("qwerty123").unwrap());
        assert!(filter.bits_set() <= 9);
        assert!(filter.bits_set() > 0);
    }

    #[test]
    fn test_idempotent_insert() {
        let mut filter = MembershipFilter::new(512, 4).unwrap();
        filter.insert("repeat").unwrap();
        let snapshot = filter.bits.clone();
        for _ in 0..10 {
            filter.insert("repeat").unwrap();
        }
        assert_eq!(snapshot, filter.bits);
    }

    #[test]
    fn test_whitespace_item_accepted() {
        let mut filter = MembershipFilter::new(256, 2).unwrap();
        filter.insert("   ").unwrap();
        assert!(filter.query("   ").unwrap());
    }

    #[test]
    fn test_single_bit_filter() {
        let mut filter = MembershipFilter::new(1, 4).unwrap();
        assert_eq!(filter.positions("x").unwrap(), vec![0; 4]);
        assert!(!filter.query("x").unwrap());
        filter.insert("x").unwrap();
        assert!(filter.query("anything").unwrap());
        assert_eq!(filter.load_factor(), 1.0);
    }

    #[test]
    fn test_no_false_negatives() {
        let mut filter = MembershipFilter::new(10_000, 5).unwrap();
        let items: Vec<String> = (0..2000).map(|i| format!("item_{}", i)).collect();
        for (n, item) in items.iter().enumerate() {
            filter.insert(item).unwrap();
            // all earlier insertions must still be found
            if n % 100 == 0 {
                assert!(items[..=n].iter().all(|i| filter.query(i).unwrap()));
            }
        }
        assert!(items.iter().all(|i| filter.query(i).unwrap()));
    }

    #[test_case(10_000, 7, 1000; "m/n = 10, k = 7")]
    #[test_case(20_000, 3, 2000; "m/n = 10, k = 3")]
    #[test_case(8192, 4, 2048; "m/n = 4, k = 4")]
    fn test_false_positive_rate_near_theory(size: usize, num_probes: usize, n: usize) {
        let mut filter = MembershipFilter::new(size, num_probes).unwrap();
        let mut rng = StdRng::seed_from_u64(12345);
        for _ in 0..n {
            filter.insert(&format!("in-{}", rng.gen::<u64>())).unwrap();
        }

        let trials = 20_000;
        let false_positives = (0..trials)
            .filter(|_| filter.query(&format!("out-{}", rng.gen::<u64>())).unwrap())
            .count();
        let observed = false_positives as f64 / trials as f64;

        let k = num_probes as f64;
        let theoretical = (1.0 - (-k * n as f64 / size as f64).exp()).powf(k);
        assert!(
            (observed - theoretical).abs() < theoretical * 0.5 + 0.005,
            "observed {observed}, theoretical {theoretical}"
        );

        // fill-based estimate tracks the observed rate as well
        let estimated = filter.estimated_false_positive_rate();
        assert!(
            (observed - estimated).abs() < estimated * 0.5 + 0.005,
            "observed {observed}, estimated {estimated}"
        );
    }

    #[test]
    fn test_debug() {
        let mut filter = MembershipFilter::new(64, 1).unwrap();
        assert_eq!(
            format!("{:?}", filter),
            "{ size: 64, num_probes: 1, bits_set: 0 }"
        );
        filter.insert("a").unwrap();
        assert_eq!(
            format!("{:?}", filter),
            "{ size: 64, num_probes: 1, bits_set: 1 }"
        );
    }
}
