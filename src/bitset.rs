//! Fixed-length bit-vectors encoding subsplits of a taxon set.
//!
//! # Overview
//! A bitset is a fixed-length sequence of booleans where each position
//! corresponds to a taxon. One side of a bipartition induced by a tree edge
//! is stored as the set of taxa it contains.
//!
//! Beyond the usual set algebra, two domain operations matter here:
//! - [`Bitset::minorize`] canonicalizes a bipartition so that a split and its
//!   complement share one representative.
//! - The PCSS accessors ([`Bitset::pcss_chunk`], [`Bitset::pcss_is_valid`])
//!   interpret a bitset as three concatenated equal-length chunks encoding a
//!   parent-child subsplit support record.
//!
//! The length is fixed at construction; algebraic operators require
//! equal-length operands.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, BitXor, Index, Not};
use std::str::FromStr;

use itertools::Itertools;

use crate::error::{Error, Result};

/// A fixed-length sequence of booleans identifying a set of taxa.
///
/// Equality and ordering are lexicographic over the boolean sequence with
/// index 0 most significant and `false < true`. The `Hash` implementation is
/// a deterministic polynomial fold of the contents, so bitsets can serve as
/// keys in hashed containers.
///
/// # Example
/// ```
/// use subsplit_trees::Bitset;
///
/// let a: Bitset = "1100".parse().unwrap();
/// assert!(a[1]);
/// assert!(!a[2]);
/// assert_eq!(a.len(), 4);
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Bitset(Vec<bool>);

impl Bitset {
    /// Creates a bitset of length `n` with every bit clear.
    pub fn zeros(n: usize) -> Self {
        Bitset(vec![false; n])
    }

    /// Creates a bitset of length `n` with every bit set to `value`.
    pub fn filled(n: usize, value: bool) -> Self {
        Bitset(vec![value; n])
    }

    /// Wraps an explicit boolean sequence.
    pub fn from_bits(bits: Vec<bool>) -> Self {
        Bitset(bits)
    }

    /// Number of bits; fixed for the lifetime of the bitset.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sets the bit at `i`.
    pub fn set(&mut self, i: usize) -> Result<()> {
        self.set_to(i, true)
    }

    /// Clears the bit at `i`.
    pub fn reset(&mut self, i: usize) -> Result<()> {
        self.set_to(i, false)
    }

    /// Writes `value` at `i`, failing if `i` is out of range.
    pub fn set_to(&mut self, i: usize, value: bool) -> Result<()> {
        let len = self.0.len();
        match self.0.get_mut(i) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(Error::IndexOutOfRange { index: i, len }),
        }
    }

    /// Flips every bit in place.
    pub fn flip(&mut self) {
        for bit in &mut self.0 {
            *bit = !*bit;
        }
    }

    /// True iff at least one bit is set.
    pub fn any(&self) -> bool {
        self.0.iter().any(|&bit| bit)
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.0.iter().filter(|&&bit| bit).count()
    }

    /// Canonicalizes an unordered bipartition in place: flips all bits iff
    /// the first bit is set. A split and its complement minorize to the same
    /// representative, so they hash (and compare) identically afterwards.
    ///
    /// ```
    /// use subsplit_trees::Bitset;
    ///
    /// let mut split: Bitset = "1010".parse().unwrap();
    /// let mut complement: Bitset = "0101".parse().unwrap();
    /// split.minorize();
    /// complement.minorize();
    /// assert_eq!(split, complement);
    /// ```
    pub fn minorize(&mut self) {
        if self.0.first().copied().unwrap_or(false) {
            self.flip();
        }
    }

    /// Overwrites the region starting at `begin` with `other`'s bits,
    /// complemented when `flipped` is true. Used to assemble a composite
    /// PCSS bitset from independently computed subsplits.
    ///
    /// # Panics
    /// Panics if the region extends past the end of this bitset.
    pub fn copy_from(&mut self, other: &Bitset, begin: usize, flipped: bool) {
        assert!(
            begin + other.len() <= self.len(),
            "copy_from region {}..{} exceeds bitset length {}",
            begin,
            begin + other.len(),
            self.len()
        );
        for (i, &bit) in other.0.iter().enumerate() {
            self.0[begin + i] = bit != flipped;
        }
    }

    /// Bitwise AND, failing on a length mismatch.
    pub fn checked_and(&self, other: &Bitset) -> Result<Bitset> {
        self.require_same_len(other)?;
        Ok(Bitset(
            self.0.iter().zip(&other.0).map(|(&a, &b)| a && b).collect(),
        ))
    }

    /// Bitwise OR, failing on a length mismatch.
    pub fn checked_or(&self, other: &Bitset) -> Result<Bitset> {
        self.require_same_len(other)?;
        Ok(Bitset(
            self.0.iter().zip(&other.0).map(|(&a, &b)| a || b).collect(),
        ))
    }

    /// Bitwise XOR, failing on a length mismatch.
    pub fn checked_xor(&self, other: &Bitset) -> Result<Bitset> {
        self.require_same_len(other)?;
        Ok(Bitset(
            self.0.iter().zip(&other.0).map(|(&a, &b)| a != b).collect(),
        ))
    }

    /// Returns the `i`-th of the three equal-length chunks of a PCSS-shaped
    /// bitset. The length must be a positive multiple of 3 and `i < 3`.
    pub fn pcss_chunk(&self, i: usize) -> Result<Bitset> {
        let third = self.pcss_chunk_len()?;
        if i >= 3 {
            return Err(Error::IndexOutOfRange { index: i, len: 3 });
        }
        Ok(Bitset(self.0[i * third..(i + 1) * third].to_vec()))
    }

    /// Best-effort validity probe for a PCSS-shaped bitset; never errors.
    ///
    /// Reading the three chunks as (uncle, mother, child): the two parent
    /// halves must be disjoint and the child clade must be a non-empty proper
    /// subset of the mother, i.e. nested strictly under exactly one parent
    /// half.
    pub fn pcss_is_valid(&self) -> bool {
        if self.0.is_empty() || self.0.len() % 3 != 0 {
            return false;
        }
        let third = self.0.len() / 3;
        let uncle = &self.0[..third];
        let mother = &self.0[third..2 * third];
        let child = &self.0[2 * third..];
        if uncle.iter().zip(mother).any(|(&u, &m)| u && m) {
            return false;
        }
        if child.iter().zip(mother).any(|(&c, &m)| c && !m) {
            return false;
        }
        let child_ones = child.iter().filter(|&&bit| bit).count();
        let mother_ones = mother.iter().filter(|&&bit| bit).count();
        child_ones > 0 && child_ones < mother_ones
    }

    /// Renders a PCSS-shaped bitset with its chunks separated by `|`.
    ///
    /// # Panics
    /// Panics if the length is not a positive multiple of 3.
    pub fn pcss_string(&self) -> String {
        let third = match self.pcss_chunk_len() {
            Ok(third) => third,
            Err(e) => panic!("{e}"),
        };
        self.0
            .chunks(third)
            .map(|chunk| chunk.iter().map(|&bit| bit_char(bit)).collect::<String>())
            .join("|")
    }

    fn pcss_chunk_len(&self) -> Result<usize> {
        if self.0.is_empty() || self.0.len() % 3 != 0 {
            return Err(Error::NotPcssShaped(self.0.len()));
        }
        Ok(self.0.len() / 3)
    }

    fn require_same_len(&self, other: &Bitset) -> Result<()> {
        if self.len() == other.len() {
            Ok(())
        } else {
            Err(Error::LengthMismatch {
                left: self.len(),
                right: other.len(),
            })
        }
    }
}

fn bit_char(bit: bool) -> char {
    if bit { '1' } else { '0' }
}

impl Index<usize> for Bitset {
    type Output = bool;

    fn index(&self, i: usize) -> &bool {
        &self.0[i]
    }
}

impl Hash for Bitset {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Polynomial fold; deterministic in the contents only.
        let mut acc: u64 = 1;
        for &bit in &self.0 {
            acc = acc.wrapping_mul(31).wrapping_add(u64::from(bit));
        }
        state.write_u64(acc);
    }
}

// The std::ops operators require equal-length operands and treat a mismatch
// as a caller bug. The checked_* methods above return the typed error
// instead.
macro_rules! forward_checked_op {
    ($trait:ident, $method:ident, $checked:ident) => {
        impl $trait for &Bitset {
            type Output = Bitset;

            fn $method(self, rhs: &Bitset) -> Bitset {
                match self.$checked(rhs) {
                    Ok(result) => result,
                    Err(e) => panic!("{e}"),
                }
            }
        }

        impl $trait for Bitset {
            type Output = Bitset;

            fn $method(self, rhs: Bitset) -> Bitset {
                (&self).$method(&rhs)
            }
        }
    };
}

forward_checked_op!(BitAnd, bitand, checked_and);
forward_checked_op!(BitOr, bitor, checked_or);
forward_checked_op!(BitXor, bitxor, checked_xor);

impl BitAndAssign<&Bitset> for Bitset {
    fn bitand_assign(&mut self, rhs: &Bitset) {
        *self = &*self & rhs;
    }
}

impl BitOrAssign<&Bitset> for Bitset {
    fn bitor_assign(&mut self, rhs: &Bitset) {
        *self = &*self | rhs;
    }
}

impl Not for Bitset {
    type Output = Bitset;

    fn not(mut self) -> Bitset {
        self.flip();
        self
    }
}

impl Not for &Bitset {
    type Output = Bitset;

    fn not(self) -> Bitset {
        !self.clone()
    }
}

impl FromStr for Bitset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                other => Err(Error::InvalidBitChar(other)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Bitset)
    }
}

impl fmt::Display for Bitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &bit in &self.0 {
            write!(f, "{}", bit_char(bit))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bs(s: &str) -> Bitset {
        s.parse().unwrap()
    }

    #[test]
    fn indexing_and_len() {
        let a = bs("1100");
        assert!(a[1]);
        assert!(!a[2]);
        assert_eq!(a.len(), 4);
    }

    #[test]
    fn set_and_reset() {
        let mut build_up = Bitset::zeros(4);
        build_up.set(1).unwrap();
        build_up.set(3).unwrap();
        assert_eq!(build_up, bs("0101"));

        let mut strip_down = Bitset::filled(4, true);
        strip_down.reset(0).unwrap();
        strip_down.reset(2).unwrap();
        assert_eq!(strip_down, bs("0101"));
    }

    #[test]
    fn out_of_range_is_typed() {
        let mut a = bs("1100");
        assert_eq!(a.set(4), Err(Error::IndexOutOfRange { index: 4, len: 4 }));
    }

    #[test]
    fn lexicographic_order() {
        assert!(bs("0100") < bs("0110"));
        assert!(bs("0010") < bs("0100"));
        assert!(bs("0110") < bs("1000"));
        assert!(bs("1100") <= bs("1100"));
        assert!(bs("0110") > bs("0100"));
        assert_eq!(std::cmp::min(bs("1100"), bs("1010")), bs("1010"));
    }

    #[test]
    fn algebra_operators() {
        assert_eq!(&bs("1100") & &bs("1010"), bs("1000"));
        assert_eq!(&bs("1100") | &bs("1010"), bs("1110"));
        assert_eq!(&bs("1100") ^ &bs("1010"), bs("0110"));
        assert_eq!(!bs("1010"), bs("0101"));

        let mut a = bs("1100");
        a &= &bs("0110");
        assert_eq!(a, bs("0100"));
        a |= &bs("0001");
        assert_eq!(a, bs("0101"));
    }

    #[test]
    fn checked_ops_report_length_mismatch() {
        assert_eq!(
            bs("110").checked_and(&bs("1100")),
            Err(Error::LengthMismatch { left: 3, right: 4 })
        );
        assert_eq!(
            bs("11").checked_xor(&bs("1")),
            Err(Error::LengthMismatch { left: 2, right: 1 })
        );
    }

    #[test]
    fn any_and_count() {
        assert!(bs("0100").any());
        assert!(!Bitset::zeros(4).any());
        assert_eq!(bs("1011").count_ones(), 3);
    }

    #[test]
    fn flip_and_minorize() {
        let mut a = bs("0100");
        a.flip();
        assert_eq!(a, bs("1011"));
        a.minorize();
        assert_eq!(a, bs("0100"));
        a.minorize();
        assert_eq!(a, bs("0100"));
    }

    #[test]
    fn copy_from_regions() {
        let mut a = bs("0100");
        a.copy_from(&bs("10"), 0, false);
        assert_eq!(a, bs("1000"));
        a.copy_from(&bs("10"), 0, true);
        assert_eq!(a, bs("0100"));
        a.copy_from(&bs("10"), 2, false);
        assert_eq!(a, bs("0110"));
        a.copy_from(&bs("10"), 2, true);
        assert_eq!(a, bs("0101"));
    }

    #[test]
    #[should_panic(expected = "copy_from region")]
    fn copy_from_overflow_panics() {
        let mut a = bs("0100");
        a.copy_from(&bs("111"), 2, false);
    }

    #[test]
    fn pcss_chunks() {
        let p = bs("000111");
        assert_eq!(p.pcss_chunk(0).unwrap(), bs("00"));
        assert_eq!(p.pcss_chunk(1).unwrap(), bs("01"));
        assert_eq!(p.pcss_chunk(2).unwrap(), bs("11"));
        assert_eq!(bs("1010").pcss_chunk(0), Err(Error::NotPcssShaped(4)));
    }

    #[test]
    fn pcss_validity() {
        assert!(bs("100011001").pcss_is_valid());
        // Parent halves overlap.
        assert!(!bs("011101").pcss_is_valid());
        // Child not nested under the mother.
        assert!(!bs("000111").pcss_is_valid());
        // Empty child clade.
        assert!(!bs("100100").pcss_is_valid());
        // Length not a multiple of three.
        assert!(!bs("1100").pcss_is_valid());
        // Child equal to the mother is not a proper refinement.
        assert!(!bs("100011011").pcss_is_valid());
    }

    #[test]
    fn pcss_string_renders_chunks() {
        assert_eq!(bs("100011001").pcss_string(), "100|011|001");
    }

    #[test]
    fn parse_and_display_round_trip() {
        let a = bs("100101");
        assert_eq!(a.to_string(), "100101");
        assert_eq!("12".parse::<Bitset>(), Err(Error::InvalidBitChar('2')));
    }

    #[test]
    fn hash_agrees_with_equality() {
        use std::collections::HashSet;

        let mut seen = HashSet::new();
        seen.insert(bs("1100"));
        assert!(seen.contains(&bs("1100")));
        assert!(!seen.contains(&bs("0100")));
    }
}
