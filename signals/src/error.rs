use thiserror::Error;

use crate::delegate::DelegateKind;

/// Failure to reach the target of a [`Delegate`](crate::Delegate).
///
/// Panics raised by the target itself are not represented here; they unwind through
/// `invoke`/`emit` untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DelegateError {
    /// The bound object (or chained signal) has been dropped
    #[error("{kind} delegate target has been dropped")]
    Expired { kind: DelegateKind },

    /// The bound object is already borrowed, typically by a re-entrant call into the same object
    #[error("delegate target is already borrowed")]
    Borrowed,
}
