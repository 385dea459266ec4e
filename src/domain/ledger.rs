use std::fmt;

use super::{Cents, PettyCash, PettyCashId};

/// Carry balances forward through `entries`, starting from `opening`.
///
/// `entries` must be sorted by chain key. Returns the indices of entries whose
/// balances changed, so callers only write back what actually moved. The
/// closing balance of the last entry is the balance carried out of the slice.
///
/// Stops at the first entry whose closing balance would not fit in `Cents`;
/// callers must discard the partially rebalanced slice.
pub fn rebalance(
    opening: Cents,
    entries: &mut [PettyCash],
) -> Result<Vec<usize>, BalanceOutOfRange> {
    debug_assert!(entries.windows(2).all(|w| w[0].key() < w[1].key()));

    let mut carried = opening;
    let mut changed = Vec::new();

    for (index, entry) in entries.iter_mut().enumerate() {
        if entry.apply_opening(carried)? {
            changed.push(index);
        }
        carried = entry.closing_balance;
    }

    Ok(changed)
}

/// A running balance left the range of `Cents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceOutOfRange {
    pub id: PettyCashId,
}

impl fmt::Display for BalanceOutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "balance out of range at entry {}", self.id)
    }
}

impl std::error::Error for BalanceOutOfRange {}

/// Current balance of an office: the closing balance of its chain tail.
pub fn chain_balance(entries: &[PettyCash]) -> Cents {
    entries.last().map(|e| e.closing_balance).unwrap_or(0)
}

/// A broken link found while verifying a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// Opening balance does not match the predecessor's closing balance
    OpeningMismatch {
        id: PettyCashId,
        expected: Cents,
        actual: Cents,
    },
    /// Closing balance is not opening + received - spent
    ClosingMismatch {
        id: PettyCashId,
        expected: Cents,
        actual: Cents,
    },
    RemainingMismatch {
        id: PettyCashId,
        closing: Cents,
        remaining: Cents,
    },
    NegativeAmount { id: PettyCashId },
    /// Opening balance plus net amount does not fit in `Cents`
    BalanceOverflow { id: PettyCashId },
}

impl fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainViolation::OpeningMismatch {
                id,
                expected,
                actual,
            } => write!(
                f,
                "{}: opening balance {} should be {}",
                id, actual, expected
            ),
            ChainViolation::ClosingMismatch {
                id,
                expected,
                actual,
            } => write!(
                f,
                "{}: closing balance {} should be {}",
                id, actual, expected
            ),
            ChainViolation::RemainingMismatch {
                id,
                closing,
                remaining,
            } => write!(
                f,
                "{}: remaining amount {} differs from closing balance {}",
                id, remaining, closing
            ),
            ChainViolation::NegativeAmount { id } => {
                write!(f, "{}: received or spent amount is negative", id)
            }
            ChainViolation::BalanceOverflow { id } => {
                write!(f, "{}: closing balance is out of range", id)
            }
        }
    }
}

/// Check every chain invariant over `entries` (sorted by chain key) without
/// modifying anything.
pub fn verify_chain(entries: &[PettyCash]) -> Vec<ChainViolation> {
    let mut violations = Vec::new();
    let mut expected_opening = 0;

    for entry in entries {
        if entry.amount_received < 0 || entry.amount_spent < 0 {
            violations.push(ChainViolation::NegativeAmount { id: entry.id });
        }
        if entry.opening_balance != expected_opening {
            violations.push(ChainViolation::OpeningMismatch {
                id: entry.id,
                expected: expected_opening,
                actual: entry.opening_balance,
            });
        }

        let expected_closing = entry
            .net_amount()
            .and_then(|net| entry.opening_balance.checked_add(net));
        match expected_closing {
            Some(expected) if expected != entry.closing_balance => {
                violations.push(ChainViolation::ClosingMismatch {
                    id: entry.id,
                    expected,
                    actual: entry.closing_balance,
                });
            }
            Some(_) => {}
            None => violations.push(ChainViolation::BalanceOverflow { id: entry.id }),
        }
        if entry.remaining_amount != entry.closing_balance {
            violations.push(ChainViolation::RemainingMismatch {
                id: entry.id,
                closing: entry.closing_balance,
                remaining: entry.remaining_amount,
            });
        }

        expected_opening = entry.closing_balance;
    }

    violations
}
