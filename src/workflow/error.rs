//! Error types for voucher lifecycle transitions.

use thiserror::Error;

use crate::api::ApiError;
use crate::model::{VoucherId, VoucherStatus};

use super::VoucherAction;

/// Local validation failure. Nothing in this enum ever reaches the
/// network; the request is refused before it is built.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("cannot {0} a voucher in {1} state")]
    NotAvailable(VoucherAction, VoucherStatus),

    #[error("voucher is locked")]
    Locked,

    #[error("voucher has already been reversed")]
    AlreadyReversed,

    // these two are shown verbatim as inline form messages
    #[error("Please provide a reason for cancellation")]
    MissingCancelReason,

    #[error("Please provide a reason for reversal")]
    MissingReverseReason,
}

/// Top-level error returned by [`Workflow::dispatch`](super::Workflow::dispatch).
///
/// Every variant renders as a human-readable message; the display string
/// is what gets surfaced to the user.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("voucher {0} not found")]
    UnknownVoucher(VoucherId),

    #[error("a request for voucher {0} is already in flight")]
    InFlight(VoucherId),

    #[error("{0}")]
    Action(#[from] ActionError),

    #[error("{0}")]
    Api(#[from] ApiError),
}
