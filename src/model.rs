//! Core domain types for the voucher module.
//!
//! These mirror the backend's wire representation: camelCase fields,
//! SCREAMING_SNAKE_CASE enumerations. All amounts are display values
//! computed server-side.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Amount;

/// Voucher identifier.
pub type VoucherId = u64;

/// The kind of accounting transaction a voucher records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherType {
    Receipt,
    Payment,
    Journal,
    Sales,
    Purchase,
    Expense,
    Delivery,
    Commission,
    Settlement,
    Refund,
    Payout,
    Opening,
    Closing,
}

/// Lifecycle status of a voucher.
///
/// `Reversed` and `Cancelled` are terminal. A `Posted` voucher may
/// additionally carry the orthogonal `is_locked` / `is_reversed` flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoucherStatus {
    Draft,
    Posted,
    Reversed,
    Cancelled,
}

impl fmt::Display for VoucherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoucherStatus::Draft => "DRAFT",
            VoucherStatus::Posted => "POSTED",
            VoucherStatus::Reversed => "REVERSED",
            VoucherStatus::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// A single debit-or-credit line within a voucher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub account_code: String,
    pub account_name: String,
    #[serde(default)]
    pub debit: Option<Amount>,
    #[serde(default)]
    pub credit: Option<Amount>,
    #[serde(default)]
    pub description: Option<String>,
}

impl LedgerEntry {
    /// Debit and credit are mutually exclusive per entry.
    pub fn is_well_formed(&self) -> bool {
        self.debit.is_some() != self.credit.is_some()
    }

    /// The amount carried by this line, whichever side it sits on.
    pub fn amount(&self) -> Amount {
        self.debit.or(self.credit).unwrap_or_default()
    }
}

/// An accounting transaction record grouping ledger entries that must
/// balance (debits = credits). Balance is enforced server-side; the
/// client only displays it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voucher {
    pub id: VoucherId,
    /// Unique display key, e.g. "JV-2025-0042".
    pub voucher_no: String,
    pub voucher_date: NaiveDate,
    pub voucher_type: VoucherType,
    #[serde(default)]
    pub narration: String,
    pub total_debit: Amount,
    pub total_credit: Amount,
    pub status: VoucherStatus,
    pub is_locked: bool,
    pub is_reversed: bool,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub entries: Vec<LedgerEntry>,
}

impl Voucher {
    /// Display-only double-entry check; never used to gate anything.
    pub fn is_balanced(&self) -> bool {
        self.total_debit == self.total_credit
    }
}

/// Classification of a chart-of-accounts node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccountClass {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

/// A chart-of-accounts node. Plain CRUD data, no lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub name: String,
    pub account_class: AccountClass,
    /// Subtype within the class, backend-defined (e.g. "CURRENT_ASSET").
    pub account_type: String,
    #[serde(default)]
    pub group: Option<String>,
    pub is_active: bool,
    pub is_system: bool,
    pub can_delete: bool,
}
