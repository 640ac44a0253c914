//! Flag validator
//!
//! A secret is read as six flags, one per mask bit, most significant first:
//!
//! | flag | mask | width |
//! |------|------|-------|
//! | 1    | 32   | 6     |
//! | 2    | 16   | 5     |
//! | 3    | 8    | 4     |
//! | 4    | 4    | 3     |
//! | 5    | 2    | 20    |
//! | 6    | 1    | 1     |
//!
//! Each test is a bitwise AND over `width` bits, padded up to a multiple of 16.
//! The secret must fit into that padded width, so the widest accepted secret is
//! 16 bits.
//!
//! Rules:
//! 1. flag 1 excludes flags 2 to 6
//! 2. flag 2 requires flag 3
//! 3. flag 4 excludes flags 5 and 6

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use mytree_merkle::Field;

/// Bit groups the AND lookup works in
const AND_CHUNK_BITS: u32 = 16;

/// One mask test
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagTest {
    /// AND mask isolating the flag bit
    pub mask: u64,
    /// Bit width of the AND
    pub width: u32,
}

impl FlagTest {
    const fn new(mask: u64, width: u32) -> Self {
        Self { mask, width }
    }

    /// Width rounded up to whole 16-bit chunks
    pub const fn padded_width(&self) -> u32 {
        self.width.div_ceil(AND_CHUNK_BITS) * AND_CHUNK_BITS
    }

    /// Whether the flag is set in `secret`
    pub fn test(&self, secret: &Field) -> Result<bool, FlagError> {
        let bits = self.padded_width();
        if secret.bit_len() > bits {
            return Err(FlagError::OutOfRange {
                secret: *secret,
                bits,
            });
        }
        Ok(secret.and_low(self.mask) != 0)
    }
}

/// Mask tests in flag order
pub const FLAG_TESTS: [FlagTest; 6] = [
    FlagTest::new(32, 6),
    FlagTest::new(16, 5),
    FlagTest::new(8, 4),
    FlagTest::new(4, 3),
    FlagTest::new(2, 20),
    FlagTest::new(1, 1),
];

/// Flag decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlagError {
    /// Secret wider than the mask test accepts
    #[error("secret {secret:?} does not fit into {bits} bits")]
    OutOfRange {
        /// Offending secret
        secret: Field,
        /// Padded range-check width
        bits: u32,
    },
}

/// A consistency rule over the decoded flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rule {
    /// Flag 1 excludes all others
    Exclusive,
    /// Flag 2 implies flag 3
    Implication,
    /// Flag 4 excludes flags 5 and 6
    MutualExclusion,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exclusive => write!(f, "flag1 excludes flags 2-6"),
            Self::Implication => write!(f, "flag2 requires flag3"),
            Self::MutualExclusion => write!(f, "flag4 excludes flags 5 and 6"),
        }
    }
}

/// The six decoded flags
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flags([bool; 6]);

impl Flags {
    /// Decode a secret
    pub fn decode(secret: &Field) -> Result<Self, FlagError> {
        let mut flags = [false; 6];
        for (flag, test) in flags.iter_mut().zip(FLAG_TESTS.iter()) {
            *flag = test.test(secret)?;
        }
        Ok(Self(flags))
    }

    /// Flag by 1-based number
    pub fn get(&self, n: usize) -> Option<bool> {
        self.0.get(n.checked_sub(1)?).copied()
    }

    /// Rules these flags break
    pub fn violations(&self) -> Vec<Rule> {
        let f = |n: usize| u8::from(self.0[n - 1]);
        let mut broken = Vec::new();
        if f(1) * (f(2) + f(3) + f(4) + f(5) + f(6)) != 0 {
            broken.push(Rule::Exclusive);
        }
        if f(2) * (1 - f(3)) != 0 {
            broken.push(Rule::Implication);
        }
        if f(4) * (f(5) + f(6)) != 0 {
            broken.push(Rule::MutualExclusion);
        }
        broken
    }

    /// All rules hold
    pub fn is_valid(&self) -> bool {
        self.violations().is_empty()
    }
}

/// Decode `secret` and evaluate all three rules
pub fn check_flags(secret: &Field) -> Result<bool, FlagError> {
    Ok(Flags::decode(secret)?.is_valid())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: [u64; 16] = [0, 1, 2, 3, 8, 9, 10, 11, 4, 12, 24, 25, 26, 27, 28, 32];

    fn check(v: u64) -> bool {
        check_flags(&Field::from_u64(v)).unwrap()
    }

    #[test]
    fn test_exhaustive_six_bits() {
        for secret in 0..64u64 {
            assert_eq!(check(secret), VALID.contains(&secret), "secret {}", secret);
        }
    }

    #[test]
    fn test_rule_attribution() {
        let violations = |v| Flags::decode(&Field::from_u64(v)).unwrap().violations();
        assert_eq!(violations(5), vec![Rule::MutualExclusion]);
        assert_eq!(violations(16), vec![Rule::Implication]);
        assert_eq!(violations(21), vec![Rule::Implication, Rule::MutualExclusion]);
        assert_eq!(violations(33), vec![Rule::Exclusive]);
        assert_eq!(
            violations(63),
            vec![Rule::Exclusive, Rule::MutualExclusion]
        );
        assert!(violations(28).is_empty());
    }

    #[test]
    fn test_decode_order() {
        let flags = Flags::decode(&Field::from_u64(0b100001)).unwrap();
        assert_eq!(flags.get(1), Some(true));
        assert_eq!(flags.get(6), Some(true));
        assert!((2..=5).all(|n| flags.get(n) == Some(false)));
        assert_eq!(flags.get(0), None);
        assert_eq!(flags.get(7), None);
    }

    #[test]
    fn test_high_bits_ignored_within_width() {
        // bit 6 and above carry no flag but still fit in 16 bits
        assert!(check(64));
        assert!(check(64 + 24));
        assert!(!check(64 + 5));
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(FLAG_TESTS[0].padded_width(), 16);
        assert_eq!(FLAG_TESTS[4].padded_width(), 32);

        assert!(check_flags(&Field::from_u64(65535)).is_ok());
        let err = check_flags(&Field::from_u64(65536)).unwrap_err();
        assert_eq!(
            err,
            FlagError::OutOfRange {
                secret: Field::from_u64(65536),
                bits: 16
            }
        );
    }

    #[test]
    fn test_pure() {
        let first: Vec<bool> = (0..64).map(check).collect();
        let second: Vec<bool> = (0..64).rev().map(check).rev().collect();
        assert_eq!(first, second);
    }
}
