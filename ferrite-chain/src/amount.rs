//! Monetary amounts, denominated in integer satoshis.

use std::fmt;
use std::iter::Sum;

use serde::{Deserialize, Serialize};

use crate::serialization::{SerializationError, WireDeserialize, WireSerialize};

/// One coin, in satoshis.
pub const COIN: i64 = 100_000_000;

/// The maximum amount of money a single output may carry: 21 million coins.
pub const MAX_MONEY: i64 = 21_000_000 * COIN;

/// An amount of satoshis.
///
/// `Amount` is a transparent wrapper with no range invariant of its own:
/// the wire format carries whatever i64 a peer sent, and range enforcement
/// (`0..=MAX_MONEY`) is a validation rule, not a parse rule. Arithmetic is
/// checked so that sums over attacker-supplied values cannot wrap.
#[derive(
    Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(i64);

impl Amount {
    /// Zero satoshis.
    pub const ZERO: Amount = Amount(0);

    /// Construct an amount from a raw satoshi count.
    pub const fn from_sats(sats: i64) -> Amount {
        Amount(sats)
    }

    /// The raw satoshi count.
    pub const fn sats(&self) -> i64 {
        self.0
    }

    /// Whether this amount is a valid output value: `0 <= sats <= MAX_MONEY`.
    pub const fn is_valid_money(&self) -> bool {
        0 <= self.0 && self.0 <= MAX_MONEY
    }

    /// Checked addition; `None` on i64 overflow.
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }

    /// Checked subtraction; `None` on i64 overflow.
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }

    /// Sum an iterator of amounts; `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, Amount::checked_add)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} sat", self.0)
    }
}

impl Sum<Amount> for Option<Amount> {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Option<Amount> {
        Amount::checked_sum(iter)
    }
}

impl WireSerialize for Amount {
    fn wire_serialize<W: std::io::Write>(&self, writer: W) -> Result<(), std::io::Error> {
        self.0.wire_serialize(writer)
    }
}

impl WireDeserialize for Amount {
    fn wire_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Amount(i64::wire_deserialize(reader)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_checks() {
        assert!(Amount::from_sats(0).is_valid_money());
        assert!(Amount::from_sats(MAX_MONEY).is_valid_money());
        assert!(!Amount::from_sats(MAX_MONEY + 1).is_valid_money());
        assert!(!Amount::from_sats(-1).is_valid_money());
    }

    #[test]
    fn checked_sum_detects_overflow() {
        let nearly_max = Amount::from_sats(i64::MAX - 1);
        assert_eq!(
            Amount::checked_sum([nearly_max, Amount::from_sats(2)]),
            None
        );
        assert_eq!(
            Amount::checked_sum([Amount::from_sats(2), Amount::from_sats(3)]),
            Some(Amount::from_sats(5))
        );
    }
}
