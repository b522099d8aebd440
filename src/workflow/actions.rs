use std::fmt;

use crate::model::{Voucher, VoucherStatus};

use super::error::ActionError;

/// A lifecycle transition that can be requested for a voucher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoucherAction {
    /// DRAFT -> POSTED; commits the ledger entries.
    Post,
    /// POSTED -> POSTED with `is_locked` set; prevents further mutation.
    Lock,
    /// POSTED -> REVERSED; the backend creates an offsetting voucher.
    Reverse,
    /// DRAFT -> CANCELLED; requires a justification.
    Cancel,
}

impl VoucherAction {
    pub const ALL: [VoucherAction; 4] = [
        VoucherAction::Post,
        VoucherAction::Lock,
        VoucherAction::Reverse,
        VoucherAction::Cancel,
    ];

    /// Path segment of the backend endpoint for this action.
    pub fn endpoint(&self) -> &'static str {
        match self {
            VoucherAction::Post => "post",
            VoucherAction::Lock => "lock",
            VoucherAction::Reverse => "reverse",
            VoucherAction::Cancel => "cancel",
        }
    }

    /// Reverse and Cancel must carry a non-empty justification.
    pub fn requires_reason(&self) -> bool {
        matches!(self, VoucherAction::Reverse | VoucherAction::Cancel)
    }

    pub fn is_offered(&self, voucher: &Voucher) -> bool {
        check(voucher, *self).is_ok()
    }
}

impl fmt::Display for VoucherAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.endpoint())
    }
}

/// Check the guard table for one action, returning the most specific
/// refusal. REVERSED and CANCELLED are terminal; a locked voucher admits
/// no further transition.
pub(crate) fn check(voucher: &Voucher, action: VoucherAction) -> Result<(), ActionError> {
    let status_allows = match action {
        VoucherAction::Post | VoucherAction::Cancel => voucher.status == VoucherStatus::Draft,
        VoucherAction::Lock | VoucherAction::Reverse => voucher.status == VoucherStatus::Posted,
    };
    if !status_allows {
        return Err(ActionError::NotAvailable(action, voucher.status));
    }
    if voucher.is_locked {
        return Err(ActionError::Locked);
    }
    if voucher.is_reversed {
        // a reversed voucher admits no further transition
        return Err(ActionError::AlreadyReversed);
    }
    Ok(())
}

/// The actions currently offered for a voucher, in a fixed order.
pub fn available_actions(voucher: &Voucher) -> Vec<VoucherAction> {
    VoucherAction::ALL
        .into_iter()
        .filter(|action| action.is_offered(voucher))
        .collect()
}

/// Build a voucher snapshot in a given lifecycle state.
#[cfg(test)]
pub(crate) fn voucher_in(status: VoucherStatus, locked: bool, reversed: bool) -> Voucher {
    use crate::Amount;
    use crate::model::VoucherType;

    Voucher {
        id: 1,
        voucher_no: "JV-2025-0001".into(),
        voucher_date: chrono::NaiveDate::from_ymd_opt(2025, 3, 14).unwrap(),
        voucher_type: VoucherType::Journal,
        narration: "test voucher".into(),
        total_debit: Amount::from_float(100.0),
        total_credit: Amount::from_float(100.0),
        status,
        is_locked: locked,
        is_reversed: reversed,
        notes: None,
        entries: Vec::new(),
    }
}
