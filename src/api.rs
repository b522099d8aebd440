//! Typed client for the voucher transition endpoints.
//!
//! The backend wraps every response in an envelope: successes carry the
//! updated voucher snapshot under `data`, rejections carry
//! `{"data": {"message": ...}}` whose message is shown to the user
//! verbatim. When no message is present a static per-action fallback is
//! used; transport failures take the same path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Voucher, VoucherId};
use crate::workflow::VoucherAction;

/// Static message used when the backend response carries none.
pub fn fallback_message(action: VoucherAction) -> &'static str {
    match action {
        VoucherAction::Post => "Failed to post voucher",
        VoucherAction::Lock => "Failed to lock voucher",
        VoucherAction::Reverse => "Failed to reverse voucher",
        VoucherAction::Cancel => "Failed to cancel voucher",
    }
}

/// Failure of a transition request. Both variants display as the exact
/// text to surface to the user.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend rejected the request (4xx/5xx).
    #[error("{message}")]
    Rejected { message: String },

    /// The request never completed (connect, timeout, malformed body).
    #[error("{}", fallback_message(*.action))]
    Transport {
        action: VoucherAction,
        #[source]
        source: reqwest::Error,
    },
}

/// Success envelope wrapping backend payloads.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    data: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ReasonBody<'a> {
    reason: &'a str,
}

/// Extract the user-facing message from an error response body, falling
/// back to the static per-action string.
fn error_message(body: &[u8], action: VoucherAction) -> String {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.data)
        .and_then(|data| data.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| fallback_message(action).to_string())
}

/// The voucher transition contract, one operation per endpoint.
///
/// Implementations return the confirmed voucher snapshot; local state is
/// only updated from that snapshot, never optimistically.
#[async_trait]
pub trait VoucherApi {
    /// `POST /vouchers/{id}/post`
    async fn post_voucher(&self, id: VoucherId) -> Result<Voucher, ApiError>;

    /// `POST /vouchers/{id}/lock`
    async fn lock_voucher(&self, id: VoucherId) -> Result<Voucher, ApiError>;

    /// `POST /vouchers/{id}/reverse` with `{"reason": ...}`
    async fn reverse_voucher(&self, id: VoucherId, reason: &str) -> Result<Voucher, ApiError>;

    /// `POST /vouchers/{id}/cancel` with `{"reason": ...}`
    async fn cancel_voucher(&self, id: VoucherId, reason: &str) -> Result<Voucher, ApiError>;
}

/// reqwest-backed implementation over a base URL.
pub struct HttpVoucherApi {
    base_url: String,
    http: reqwest::Client,
}

impl HttpVoucherApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    async fn transition(
        &self,
        action: VoucherAction,
        id: VoucherId,
        reason: Option<&str>,
    ) -> Result<Voucher, ApiError> {
        let url = format!("{}/vouchers/{}/{}", self.base_url, id, action.endpoint());

        let mut request = self.http.post(&url);
        if let Some(reason) = reason {
            request = request.json(&ReasonBody { reason });
        }

        let response = request
            .send()
            .await
            .map_err(|source| ApiError::Transport { action, source })?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport { action, source })?;

        if status.is_success() {
            let envelope: Envelope<Voucher> = serde_json::from_slice(&body)
                .map_err(|_| ApiError::Rejected {
                    message: fallback_message(action).to_string(),
                })?;
            Ok(envelope.data)
        } else {
            Err(ApiError::Rejected {
                message: error_message(&body, action),
            })
        }
    }
}

#[async_trait]
impl VoucherApi for HttpVoucherApi {
    async fn post_voucher(&self, id: VoucherId) -> Result<Voucher, ApiError> {
        self.transition(VoucherAction::Post, id, None).await
    }

    async fn lock_voucher(&self, id: VoucherId) -> Result<Voucher, ApiError> {
        self.transition(VoucherAction::Lock, id, None).await
    }

    async fn reverse_voucher(&self, id: VoucherId, reason: &str) -> Result<Voucher, ApiError> {
        self.transition(VoucherAction::Reverse, id, Some(reason)).await
    }

    async fn cancel_voucher(&self, id: VoucherId, reason: &str) -> Result<Voucher, ApiError> {
        self.transition(VoucherAction::Cancel, id, Some(reason)).await
    }
}
