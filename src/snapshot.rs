use std::io;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::model::Voucher;
use crate::workflow::VoucherAction;

/// Errors that can occur when loading voucher snapshot files
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Read voucher snapshots from a JSON file holding an array of vouchers.
///
/// Unbalanced vouchers are loaded anyway (balance is enforced
/// server-side) but logged, since a snapshot that does not balance
/// usually means a stale or truncated export.
pub fn read_vouchers(path: impl AsRef<Path>) -> Result<Vec<Voucher>, SnapshotError> {
    let display = path.as_ref().display().to_string();

    let contents = std::fs::read(path.as_ref()).map_err(|source| SnapshotError::Io {
        path: display.clone(),
        source,
    })?;

    let vouchers: Vec<Voucher> =
        serde_json::from_slice(&contents).map_err(|source| SnapshotError::Parse {
            path: display,
            source,
        })?;

    for voucher in &vouchers {
        if !voucher.is_balanced() {
            warn!(
                voucher = %voucher.voucher_no,
                debit = %voucher.total_debit,
                credit = %voucher.total_credit,
                "voucher totals do not balance"
            );
        }
    }

    Ok(vouchers)
}

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    voucher: &'a str,
    status: String,
    locked: bool,
    reversed: bool,
    post: bool,
    lock: bool,
    reverse: bool,
    cancel: bool,
}

/// Write the action-availability report in csv format
pub fn write_actions<'a, W: io::Write>(
    writer: W,
    vouchers: impl IntoIterator<Item = &'a Voucher>,
) {
    let mut writer = csv::Writer::from_writer(writer);

    for voucher in vouchers {
        let row = ReportRow {
            voucher: &voucher.voucher_no,
            status: voucher.status.to_string(),
            locked: voucher.is_locked,
            reversed: voucher.is_reversed,
            post: VoucherAction::Post.is_offered(voucher),
            lock: VoucherAction::Lock.is_offered(voucher),
            reverse: VoucherAction::Reverse.is_offered(voucher),
            cancel: VoucherAction::Cancel.is_offered(voucher),
        };
        writer.serialize(&row).expect("failed to write csv row");
    }

    writer.flush().expect("failed to flush csv writer");
}
