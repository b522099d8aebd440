pub mod amount;
pub mod api;
pub mod import;
pub mod model;
pub mod snapshot;
pub mod workflow;

pub use amount::Amount;
pub use model::{Voucher, VoucherId, VoucherStatus, VoucherType};
pub use workflow::{Command, VoucherAction, Workflow, available_actions};
