//! Threshold crossing state machine.

use crate::models::ItemStatus;
use rust_decimal::Decimal;

/// Outcome of evaluating one sample against an item's target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub status: ItemStatus,
    /// True only on the transition into `TargetReached`
    pub is_new_crossing: bool,
}

/// Decide the new status for a successful sample.
///
/// Edge-triggered: staying at or below target after already reaching it is
/// not a new crossing, and moving back above target never is. An `Error`
/// previous status counts as `Tracking`.
pub fn evaluate(previous: ItemStatus, current_price: Decimal, target_price: Decimal) -> Evaluation {
    if current_price <= target_price {
        Evaluation {
            status: ItemStatus::TargetReached,
            is_new_crossing: previous != ItemStatus::TargetReached,
        }
    } else {
        Evaluation {
            status: ItemStatus::Tracking,
            is_new_crossing: false,
        }
    }
}

/// Status for a failed sample. Never a crossing.
pub fn evaluate_failure() -> Evaluation {
    Evaluation {
        status: ItemStatus::Error,
        is_new_crossing: false,
    }
}
