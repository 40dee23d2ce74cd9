//! Cardinality estimator allows to estimate number of distinct elements
//! in the stream or dataset and is defined with runtime `precision` parameter
//! `p` in [4..20] range, which defines number of bits to use for HyperLogLog
//! register indices (`m = 2^p` registers).
//!
//! # Hash decomposition
//!
//! Every item is reduced to a 64-bit hash:
//! - top `p` bits      - register index in `[0, m)`.
//! - low `64 - p` bits - rank source; rank is the number of leading zero bits
//!   within that width plus one, so it lies in `[1, 64 - p + 1]`.
//!
//! Text items (`update`) are hashed with BLAKE2b using an 8-byte digest read as
//! a big-endian `u64`. Arbitrary `Hash` items (`insert`) go through the
//! estimator's `H` hasher, `WyHash` by default.
//!
//! # Estimate
//!
//! Raw HyperLogLog estimate `alpha * m^2 / sum(2^-register)` with two range
//! corrections:
//! - small range: raw `<= 2.5 * m` and some register is still zero - linear
//!   counting `m * ln(m / zeros)`.
//! - large range: raw `> 2^64 / 30` - `-2^64 * ln(1 - raw / 2^64)`.
//!
//! Original HyperLogLog paper:
//! http://algo.inria.fr/flajolet/Publications/FlFuGaMe07.pdf
//!
//! # Data storage format
//!
//! Registers are kept in a `u32` slice:
//! - data[0]       - stores number of HyperLogLog registers set to 0.
//! - data[1..]     - stores register ranks using `W = 6` bits per each register,
//!   followed by one extra element for branchless register access.

use std::fmt::{Debug, Formatter};
use std::hash::{BuildHasher, BuildHasherDefault, Hash, Hasher};
use std::mem::{size_of, size_of_val};

use blake2::digest::consts::U8;
use blake2::{Blake2b, Digest};
use tracing::debug;
use wyhash::WyHash;

use crate::error::{Error, Result};

/// Smallest accepted precision
pub const MIN_PRECISION: u8 = 4;
/// Largest accepted precision
pub const MAX_PRECISION: u8 = 20;

/// Register width in bits; the largest rank, `64 - 4 + 1 = 61`, fits in 6 bits.
const W: usize = 6;
/// Offset of the first register word in `data`
const REGISTERS_OFFSET: usize = 1;
/// 2^64 as used by the large range correction
const TWO_POW_64: f64 = 18_446_744_073_709_551_616.0;

type Blake2b64 = Blake2b<U8>;

pub struct CardinalityEstimator<H: Hasher + Default = WyHash> {
    /// Precision `p`
    precision: u8,
    /// Bias correction constant for `m = 2^p` registers
    alpha: f64,
    /// Raw data format described above
    data: Vec<u32>,
    /// Zero-sized build hasher
    build_hasher: BuildHasherDefault<H>,
}

impl CardinalityEstimator {
    /// Creates new instance of `CardinalityEstimator` with `2^precision` registers.
    ///
    /// Fails with [`Error::InvalidArgument`] when `precision` is outside [4..20].
    pub fn new(precision: u8) -> Result<Self> {
        Self::with_hasher(precision)
    }
}

impl<H: Hasher + Default> CardinalityEstimator<H> {
    /// Creates new instance of `CardinalityEstimator` using `H` for [`insert`](Self::insert).
    pub fn with_hasher(precision: u8) -> Result<Self> {
        validate_precision(precision)?;

        let m = 1usize << precision;
        let mut data = vec![0u32; m * W / 32 + REGISTERS_OFFSET + 1];
        data[0] = m as u32;

        debug!(precision, registers = m, "created cardinality estimator");
        Ok(Self {
            precision,
            alpha: alpha(m),
            data,
            build_hasher: BuildHasherDefault::default(),
        })
    }

    /// Precision `p`
    #[inline]
    pub fn precision(&self) -> u8 {
        self.precision
    }

    /// Number of registers `m = 2^p`
    #[inline]
    pub fn register_count(&self) -> usize {
        1 << self.precision
    }

    /// Bias correction constant
    #[inline]
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Current value of register `idx`, or `None` if `idx >= m`
    pub fn register(&self, idx: usize) -> Option<u8> {
        (idx < self.register_count()).then(|| get_register(&self.data, idx) as u8)
    }

    /// Number of registers still holding zero
    #[inline]
    pub fn zero_registers(&self) -> usize {
        self.data[0] as usize
    }

    /// Update estimator with a text item hashed from its UTF-8 bytes
    #[inline]
    pub fn update(&mut self, item: &str) {
        self.insert_hash(hash_bytes(item.as_bytes()));
    }

    /// Insert a hashable item into `CardinalityEstimator`
    #[inline]
    pub fn insert<T: Hash + ?Sized>(&mut self, item: &T) {
        let mut hasher = self.build_hasher.build_hasher();
        item.hash(&mut hasher);
        self.insert_hash(hasher.finish());
    }

    /// Insert a 64-bit hash into `CardinalityEstimator`
    #[inline]
    pub fn insert_hash(&mut self, hash: u64) {
        let (idx, rank) = decode_hash(hash, self.precision);
        self.update_rank(idx, rank);
    }

    /// Raise register `idx` to `new_rank` if it is larger than the current value
    #[inline]
    fn update_rank(&mut self, idx: usize, new_rank: u32) {
        let old_rank = get_register(&self.data, idx);
        if new_rank > old_rank {
            set_register(&mut self.data, idx, new_rank);
            self.data[0] -= u32::from(old_rank == 0);
        }
    }

    /// Return cardinality estimate
    pub fn estimate(&self) -> f64 {
        let m = self.register_count();
        let sum: f64 = (0..m)
            .map(|idx| (-f64::from(get_register(&self.data, idx))).exp2())
            .sum();
        let m = m as f64;
        let raw = self.alpha * m * m / sum;

        correct_estimate(raw, m, self.zero_registers())
    }

    /// Merge cardinality estimators by taking register-wise maximum
    pub fn merge(&mut self, rhs: &Self) -> Result<()> {
        if self.precision != rhs.precision {
            return Err(Error::IncompatibleMerge {
                expected: self.precision,
                found: rhs.precision,
            });
        }

        for idx in 0..self.register_count() {
            self.update_rank(idx, get_register(&rhs.data, idx));
        }
        Ok(())
    }

    /// Return memory size of `CardinalityEstimator`
    pub fn size_of(&self) -> usize {
        size_of::<Self>() + size_of_val(self.data.as_slice())
    }
}

impl<H: Hasher + Default> Clone for CardinalityEstimator<H> {
    fn clone(&self) -> Self {
        Self {
            precision: self.precision,
            alpha: self.alpha,
            data: self.data.clone(),
            build_hasher: BuildHasherDefault::default(),
        }
    }
}

impl<H: Hasher + Default> PartialEq for CardinalityEstimator<H> {
    /// Compare cardinality estimators
    fn eq(&self, rhs: &Self) -> bool {
        self.precision == rhs.precision && self.data == rhs.data
    }
}

impl<H: Hasher + Default> Debug for CardinalityEstimator<H> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{{ precision: {}, estimate: {:.2}, size: {} }}",
            self.precision,
            self.estimate(),
            self.size_of()
        )
    }
}

/// Reject precision outside of [4..20] before anything is allocated
pub(crate) fn validate_precision(precision: u8) -> Result<()> {
    if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        return Err(Error::invalid_argument(
            "precision",
            format!("must be in [{MIN_PRECISION}, {MAX_PRECISION}], got {precision}"),
        ));
    }
    Ok(())
}

/// 64-bit BLAKE2b digest of `bytes` read as big-endian integer
#[inline]
fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&Blake2b64::digest(bytes));
    u64::from_be_bytes(buf)
}

/// Split hash into register index (top `p` bits) and rank of the remaining bits
#[inline]
fn decode_hash(hash: u64, precision: u8) -> (usize, u32) {
    let p = u32::from(precision);
    let idx = (hash >> (64 - p)) as usize;
    let w = hash & ((1u64 << (64 - p)) - 1);
    // top `p` bits of `w` are zero, so they are subtracted back out;
    // `w == 0` yields the maximum rank `64 - p + 1`
    let rank = w.leading_zeros() - p + 1;
    (idx, rank)
}

/// Apply small and large range corrections to the raw estimate
#[inline]
fn correct_estimate(raw: f64, m: f64, zeros: usize) -> f64 {
    if raw <= 2.5 * m && zeros > 0 {
        return m * (m / zeros as f64).ln();
    }
    if raw >= TWO_POW_64 {
        // beyond the 64-bit hash space the correction has no finite value
        return raw;
    }
    if raw > TWO_POW_64 / 30.0 {
        return -TWO_POW_64 * (1.0 - raw / TWO_POW_64).ln();
    }
    raw
}

/// Parameter for bias correction
#[inline]
fn alpha(m: usize) -> f64 {
    match m {
        16 => 0.673,
        32 => 0.697,
        64 => 0.709,
        _ => 0.7213 / (1.0 + 1.079 / (m as f64)),
    }
}

/// Get HyperLogLog `idx` register
#[inline]
fn get_register(data: &[u32], idx: usize) -> u32 {
    let bit_idx = idx * W;
    let u32_idx = (bit_idx / 32) + REGISTERS_OFFSET;
    let bit_pos = bit_idx % 32;
    let bits_1 = W.min(32 - bit_pos);
    let bits_2 = W - bits_1;
    let mask_1 = (1 << bits_1) - 1;
    let mask_2 = (1 << bits_2) - 1;

    ((data[u32_idx] >> bit_pos) & mask_1) | ((data[u32_idx + 1] & mask_2) << bits_1)
}

/// Set HyperLogLog `idx` register to new value `rank`
#[inline]
fn set_register(data: &mut [u32], idx: usize, new_rank: u32) {
    let bit_idx = idx * W;
    let u32_idx = (bit_idx / 32) + REGISTERS_OFFSET;
    let bit_pos = bit_idx % 32;
    let bits_1 = W.min(32 - bit_pos);
    let bits_2 = W - bits_1;
    let mask_1 = (1 << bits_1) - 1;
    let mask_2 = (1 << bits_2) - 1;

    // Unconditionally update two `u32` elements based on `new_rank` bits and masks
    data[u32_idx] &= !(mask_1 << bit_pos);
    data[u32_idx] |= (new_rank & mask_1) << bit_pos;
    data[u32_idx + 1] &= !mask_2;
    data[u32_idx + 1] |= (new_rank >> bits_1) & mask_2;
}
