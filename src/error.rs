//! Typed errors for recoverable operation failures.
//!
//! These cover the "a caller may want to validate first" tier: mismatched
//! bit-vector lengths, out-of-range indices, malformed bit strings. Hard
//! structural invariant violations (empty child lists, duplicate taxa,
//! detrifurcating a non-trifurcating root) are caller bugs and panic instead.

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bit-vector algebra applied to operands of different lengths.
    #[error("bitset length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// Index outside the valid range of a bitset or branch-length vector.
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// A bitset whose length does not split into three equal chunks was used
    /// where a PCSS-shaped one is required.
    #[error("bitset length {0} does not divide into three equal chunks")]
    NotPcssShaped(usize),

    /// A character other than '0' or '1' in a bit string.
    #[error("invalid bit character {0:?}")]
    InvalidBitChar(char),
}
