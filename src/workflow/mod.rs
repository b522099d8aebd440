//! Voucher lifecycle workflow.
//!
//! The workflow holds a registry of voucher snapshots and drives their
//! lifecycle transitions (post, lock, reverse, cancel) against the
//! backend. Guards and reason validation run locally before any request
//! is built; local state only changes once the backend confirms a
//! transition with an updated snapshot. Also supports an async stream
//! of commands.

use std::collections::{HashMap, HashSet};

use tokio_stream::{Stream, StreamExt};
use tracing::info;

use crate::api::VoucherApi;
use crate::model::{Voucher, VoucherId};

mod actions;
pub use actions::{VoucherAction, available_actions};

mod error;
pub use error::{ActionError, WorkflowError};

/// A requested transition for one voucher.
#[derive(Debug, Clone)]
pub struct Command {
    pub voucher: VoucherId,
    pub action: VoucherAction,
    pub reason: Option<String>,
}

impl Command {
    pub fn post(voucher: VoucherId) -> Self {
        Self {
            voucher,
            action: VoucherAction::Post,
            reason: None,
        }
    }

    pub fn lock(voucher: VoucherId) -> Self {
        Self {
            voucher,
            action: VoucherAction::Lock,
            reason: None,
        }
    }

    pub fn reverse(voucher: VoucherId, reason: impl Into<String>) -> Self {
        Self {
            voucher,
            action: VoucherAction::Reverse,
            reason: Some(reason.into()),
        }
    }

    pub fn cancel(voucher: VoucherId, reason: impl Into<String>) -> Self {
        Self {
            voucher,
            action: VoucherAction::Cancel,
            reason: Some(reason.into()),
        }
    }
}

/// The voucher lifecycle workflow.
///
/// Maintains voucher snapshots and the set of transitions currently in
/// flight, so the same voucher cannot be submitted twice concurrently.
pub struct Workflow<A> {
    vouchers: HashMap<VoucherId, Voucher>,
    /// Vouchers with a transition request awaiting backend confirmation
    in_flight: HashSet<VoucherId>,
    api: A,
}

/// Public API
impl<A: VoucherApi> Workflow<A> {
    pub fn new(api: A) -> Self {
        Self {
            vouchers: HashMap::new(),
            in_flight: HashSet::new(),
            api,
        }
    }

    /// Register a voucher snapshot, replacing any previous one.
    pub fn load(&mut self, voucher: Voucher) {
        self.vouchers.insert(voucher.id, voucher);
    }

    /// Return all registered voucher snapshots.
    pub fn vouchers(&self) -> impl Iterator<Item = &Voucher> + '_ {
        self.vouchers.values()
    }

    /// Return one voucher snapshot.
    pub fn get(&self, id: VoucherId) -> Option<&Voucher> {
        self.vouchers.get(&id)
    }

    /// Look a voucher up by its display key.
    pub fn find_by_no(&self, voucher_no: &str) -> Option<&Voucher> {
        self.vouchers.values().find(|v| v.voucher_no == voucher_no)
    }

    /// The actions currently offered for a registered voucher.
    pub fn actions_for(&self, id: VoucherId) -> Option<Vec<VoucherAction>> {
        self.vouchers.get(&id).map(available_actions)
    }

    /// Drive the workflow with a stream of commands, applied one at a
    /// time. Failures are logged and surfaced per-command; the loop
    /// never stops.
    pub async fn run(&mut self, mut stream: impl Stream<Item = Command> + Unpin) {
        while let Some(command) = stream.next().await {
            let _ = self.dispatch(command).await;
        }
    }

    /// Request a single transition.
    ///
    /// On success the voucher snapshot is replaced with the confirmed one,
    /// exactly once. On any failure the registered snapshot is untouched
    /// and the error's display string is the message to show the user.
    pub async fn dispatch(&mut self, command: Command) -> Result<(), WorkflowError> {
        let Command {
            voucher: id,
            action,
            reason,
        } = command;
        let result = self.try_dispatch(id, action, reason).await;
        Self::log_result(action, id, &result);
        result
    }
}

/// Private API
impl<A: VoucherApi> Workflow<A> {
    async fn try_dispatch(
        &mut self,
        id: VoucherId,
        action: VoucherAction,
        reason: Option<String>,
    ) -> Result<(), WorkflowError> {
        let voucher = self
            .vouchers
            .get(&id)
            .ok_or(WorkflowError::UnknownVoucher(id))?;

        if self.in_flight.contains(&id) {
            return Err(WorkflowError::InFlight(id));
        }

        // local validation; refusals here never issue a request
        actions::check(voucher, action)?;
        let reason = validate_reason(action, reason)?;

        self.in_flight.insert(id);
        // the guard clears the entry even if this future is dropped mid-await
        let _in_flight = InFlightGuard {
            set: &mut self.in_flight,
            id,
        };
        let result = match (action, reason.as_deref()) {
            (VoucherAction::Post, _) => self.api.post_voucher(id).await,
            (VoucherAction::Lock, _) => self.api.lock_voucher(id).await,
            (VoucherAction::Reverse, Some(reason)) => self.api.reverse_voucher(id, reason).await,
            (VoucherAction::Cancel, Some(reason)) => self.api.cancel_voucher(id, reason).await,
            // validate_reason always yields a reason for reverse and cancel
            (VoucherAction::Reverse | VoucherAction::Cancel, None) => unreachable!(),
        };
        drop(_in_flight);

        let snapshot = result?;
        self.vouchers.insert(id, snapshot);
        Ok(())
    }

    /// Small helper to log `dispatch` results
    fn log_result(action: VoucherAction, id: VoucherId, result: &Result<(), WorkflowError>) {
        match result {
            Ok(()) => {
                info!(voucher = id, action = %action, "transition applied");
            }
            Err(e) => {
                info!(voucher = id, action = %action, reason = %e, "transition skipped");
            }
        }
    }
}

/// Removes a voucher from the in-flight set on drop, so an abandoned
/// request cannot strand the voucher in a permanently-refused state.
struct InFlightGuard<'a> {
    set: &'a mut HashSet<VoucherId>,
    id: VoucherId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

/// Reject empty or whitespace-only reasons for the actions that require
/// one, before any request is built.
fn validate_reason(
    action: VoucherAction,
    reason: Option<String>,
) -> Result<Option<String>, ActionError> {
    if !action.requires_reason() {
        return Ok(None);
    }
    let reason = reason.unwrap_or_default();
    if reason.trim().is_empty() {
        return Err(match action {
            VoucherAction::Cancel => ActionError::MissingCancelReason,
            _ => ActionError::MissingReverseReason,
        });
    }
    Ok(Some(reason))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::actions::voucher_in;
    use super::*;
    use crate::api::ApiError;
    use crate::model::VoucherStatus;

    /// In-memory stand-in for the backend, applying the same transition
    /// table the real service does.
    struct FakeApi {
        vouchers: Mutex<HashMap<VoucherId, Voucher>>,
        /// When set, every request is rejected with this message
        reject_with: Option<String>,
        requests: AtomicUsize,
    }

    impl FakeApi {
        fn new(vouchers: impl IntoIterator<Item = Voucher>) -> Self {
            Self {
                vouchers: Mutex::new(vouchers.into_iter().map(|v| (v.id, v)).collect()),
                reject_with: None,
                requests: AtomicUsize::new(0),
            }
        }

        fn rejecting(vouchers: impl IntoIterator<Item = Voucher>, message: &str) -> Self {
            Self {
                reject_with: Some(message.to_string()),
                ..Self::new(vouchers)
            }
        }

        fn requests(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        fn apply(
            &self,
            id: VoucherId,
            update: impl FnOnce(&mut Voucher),
        ) -> Result<Voucher, ApiError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if let Some(message) = &self.reject_with {
                return Err(ApiError::Rejected {
                    message: message.clone(),
                });
            }
            let mut vouchers = self.vouchers.lock().unwrap();
            let voucher = vouchers.get_mut(&id).ok_or(ApiError::Rejected {
                message: "Voucher not found".into(),
            })?;
            update(voucher);
            Ok(voucher.clone())
        }
    }

    #[async_trait]
    impl VoucherApi for &FakeApi {
        async fn post_voucher(&self, id: VoucherId) -> Result<Voucher, ApiError> {
            self.apply(id, |v| v.status = VoucherStatus::Posted)
        }

        async fn lock_voucher(&self, id: VoucherId) -> Result<Voucher, ApiError> {
            self.apply(id, |v| v.is_locked = true)
        }

        async fn reverse_voucher(&self, id: VoucherId, _reason: &str) -> Result<Voucher, ApiError> {
            self.apply(id, |v| {
                v.status = VoucherStatus::Reversed;
                v.is_reversed = true;
            })
        }

        async fn cancel_voucher(&self, id: VoucherId, _reason: &str) -> Result<Voucher, ApiError> {
            self.apply(id, |v| v.status = VoucherStatus::Cancelled)
        }
    }

    fn with_id(mut voucher: Voucher, id: VoucherId) -> Voucher {
        voucher.id = id;
        voucher.voucher_no = format!("JV-2025-{id:04}");
        voucher
    }

    fn draft(id: VoucherId) -> Voucher {
        with_id(voucher_in(VoucherStatus::Draft, false, false), id)
    }

    fn posted(id: VoucherId) -> Voucher {
        with_id(voucher_in(VoucherStatus::Posted, false, false), id)
    }

    #[tokio::test]
    async fn post_transitions_draft_to_posted() {
        let api = FakeApi::new([draft(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(1));

        workflow.dispatch(Command::post(1)).await.unwrap();

        assert_eq!(workflow.get(1).unwrap().status, VoucherStatus::Posted);
        assert_eq!(api.requests(), 1);
    }

    #[tokio::test]
    async fn reverse_with_reason_marks_voucher_reversed() {
        let api = FakeApi::new([posted(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(posted(1));

        workflow
            .dispatch(Command::reverse(1, "duplicate entry"))
            .await
            .unwrap();

        let voucher = workflow.get(1).unwrap();
        assert_eq!(voucher.status, VoucherStatus::Reversed);
        assert!(voucher.is_reversed);
        assert_eq!(api.requests(), 1);
    }

    #[tokio::test]
    async fn lock_sets_flag_and_keeps_status_posted() {
        let api = FakeApi::new([posted(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(posted(1));

        workflow.dispatch(Command::lock(1)).await.unwrap();

        let voucher = workflow.get(1).unwrap();
        assert!(voucher.is_locked);
        assert_eq!(voucher.status, VoucherStatus::Posted);
    }

    #[tokio::test]
    async fn cancel_with_reason_transitions_to_cancelled() {
        let api = FakeApi::new([draft(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(1));

        workflow
            .dispatch(Command::cancel(1, "entered twice"))
            .await
            .unwrap();

        assert_eq!(workflow.get(1).unwrap().status, VoucherStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_with_empty_reason_sends_no_request() {
        let api = FakeApi::new([draft(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(1));

        let err = workflow
            .dispatch(Command::cancel(1, ""))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Please provide a reason for cancellation");
        assert_eq!(api.requests(), 0);
        assert_eq!(workflow.get(1).unwrap().status, VoucherStatus::Draft);
    }

    #[tokio::test]
    async fn reverse_with_whitespace_reason_sends_no_request() {
        let api = FakeApi::new([posted(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(posted(1));

        let err = workflow
            .dispatch(Command::reverse(1, "   \t"))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "Please provide a reason for reversal");
        assert_eq!(api.requests(), 0);
        assert!(!workflow.get(1).unwrap().is_reversed);
    }

    #[tokio::test]
    async fn post_on_locked_draft_is_refused_locally() {
        let api = FakeApi::new([]);
        let mut workflow = Workflow::new(&api);
        workflow.load(with_id(voucher_in(VoucherStatus::Draft, true, false), 1));

        let err = workflow.dispatch(Command::post(1)).await.unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Action(ActionError::Locked)
        ));
        assert_eq!(api.requests(), 0);
    }

    #[tokio::test]
    async fn reverse_on_reversed_voucher_is_refused_locally() {
        let api = FakeApi::new([]);
        let mut workflow = Workflow::new(&api);
        workflow.load(with_id(voucher_in(VoucherStatus::Posted, false, true), 1));

        let err = workflow
            .dispatch(Command::reverse(1, "again"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Action(ActionError::AlreadyReversed)
        ));
        assert_eq!(api.requests(), 0);
    }

    #[tokio::test]
    async fn cancel_on_posted_voucher_is_refused_locally() {
        let api = FakeApi::new([]);
        let mut workflow = Workflow::new(&api);
        workflow.load(posted(1));

        let err = workflow
            .dispatch(Command::cancel(1, "wrong state"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            WorkflowError::Action(ActionError::NotAvailable(
                VoucherAction::Cancel,
                VoucherStatus::Posted
            ))
        ));
        assert_eq!(api.requests(), 0);
    }

    #[tokio::test]
    async fn backend_rejection_leaves_state_unchanged() {
        let api = FakeApi::rejecting([draft(1)], "Accounting period is closed");
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(1));

        let err = workflow.dispatch(Command::post(1)).await.unwrap_err();

        assert_eq!(err.to_string(), "Accounting period is closed");
        assert_eq!(workflow.get(1).unwrap().status, VoucherStatus::Draft);
        assert_eq!(api.requests(), 1);
    }

    #[tokio::test]
    async fn unknown_voucher_is_refused() {
        let api = FakeApi::new([]);
        let mut workflow = Workflow::new(&api);

        let err = workflow.dispatch(Command::post(99)).await.unwrap_err();

        assert!(matches!(err, WorkflowError::UnknownVoucher(99)));
        assert_eq!(api.requests(), 0);
    }

    #[tokio::test]
    async fn duplicate_submission_while_in_flight_is_refused() {
        let api = FakeApi::new([draft(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(1));
        workflow.in_flight.insert(1);

        let err = workflow.dispatch(Command::post(1)).await.unwrap_err();

        assert!(matches!(err, WorkflowError::InFlight(1)));
        assert_eq!(api.requests(), 0);
    }

    /// Backend that never answers; requests stay pending forever.
    struct StalledApi;

    #[async_trait]
    impl VoucherApi for StalledApi {
        async fn post_voucher(&self, _id: VoucherId) -> Result<Voucher, ApiError> {
            std::future::pending().await
        }

        async fn lock_voucher(&self, _id: VoucherId) -> Result<Voucher, ApiError> {
            std::future::pending().await
        }

        async fn reverse_voucher(
            &self,
            _id: VoucherId,
            _reason: &str,
        ) -> Result<Voucher, ApiError> {
            std::future::pending().await
        }

        async fn cancel_voucher(
            &self,
            _id: VoucherId,
            _reason: &str,
        ) -> Result<Voucher, ApiError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn abandoned_dispatch_does_not_strand_voucher_in_flight() {
        use std::future::{Future, poll_fn};
        use std::pin::pin;
        use std::task::Poll;

        let mut workflow = Workflow::new(StalledApi);
        workflow.load(draft(1));

        {
            let mut dispatch = pin!(workflow.dispatch(Command::post(1)));
            // drive the request into flight, then abandon it
            poll_fn(|cx| {
                assert!(dispatch.as_mut().poll(cx).is_pending());
                Poll::Ready(())
            })
            .await;
        }

        assert!(workflow.in_flight.is_empty());
        assert_eq!(workflow.get(1).unwrap().status, VoucherStatus::Draft);
    }

    #[tokio::test]
    async fn confirmed_transition_is_applied_exactly_once() {
        let api = FakeApi::new([draft(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(1));

        workflow.dispatch(Command::post(1)).await.unwrap();

        // the same transition is no longer available
        let err = workflow.dispatch(Command::post(1)).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Action(ActionError::NotAvailable(
                VoucherAction::Post,
                VoucherStatus::Posted
            ))
        ));
        assert_eq!(api.requests(), 1);
    }

    #[tokio::test]
    async fn run_skips_failed_commands_and_continues() {
        let api = FakeApi::new([draft(1), draft(2)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(1));
        workflow.load(draft(2));

        let commands = vec![
            Command::post(1),
            Command::cancel(2, ""), // refused locally, loop continues
            Command::lock(1),
        ];
        workflow.run(tokio_stream::iter(commands)).await;

        let first = workflow.get(1).unwrap();
        assert_eq!(first.status, VoucherStatus::Posted);
        assert!(first.is_locked);
        assert_eq!(workflow.get(2).unwrap().status, VoucherStatus::Draft);
        assert_eq!(api.requests(), 2);
    }

    #[tokio::test]
    async fn actions_for_reflects_registered_snapshot() {
        let api = FakeApi::new([draft(1)]);
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(1));

        assert_eq!(
            workflow.actions_for(1),
            Some(vec![VoucherAction::Post, VoucherAction::Cancel])
        );
        assert_eq!(workflow.actions_for(2), None);

        workflow.dispatch(Command::post(1)).await.unwrap();
        assert_eq!(
            workflow.actions_for(1),
            Some(vec![VoucherAction::Lock, VoucherAction::Reverse])
        );
    }

    #[tokio::test]
    async fn find_by_no_matches_display_key() {
        let api = FakeApi::new([]);
        let mut workflow = Workflow::new(&api);
        workflow.load(draft(7));

        assert_eq!(workflow.find_by_no("JV-2025-0007").unwrap().id, 7);
        assert!(workflow.find_by_no("JV-2025-9999").is_none());
    }
}
