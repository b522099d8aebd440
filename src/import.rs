//! Bulk category import boundary.
//!
//! Pure pass-through: the spreadsheet bytes go to the backend untouched
//! and the structured report comes back. No parsing or validation
//! happens on this side. Only one upload may be in flight at a time;
//! there is no cancellation once started.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize;
use thiserror::Error;

use crate::api::Envelope;

/// Validation failures for one spreadsheet row.
#[derive(Debug, Clone, Deserialize)]
pub struct RowErrors {
    pub row: u32,
    pub errors: Vec<String>,
}

/// Outcome of a bulk import, as reported by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportReport {
    pub imported: u32,
    pub failed: u32,
    #[serde(default)]
    pub errors: Vec<RowErrors>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("an import is already in progress")]
    Busy,

    /// Backend rejection; the message is shown verbatim.
    #[error("{message}")]
    Rejected { message: String },

    #[error("Failed to import categories")]
    Transport(#[source] reqwest::Error),
}

/// Clears the busy flag on drop, so an abandoned upload cannot leave
/// the importer permanently refusing new uploads.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Uploads category spreadsheets and returns the backend's report.
pub struct CategoryImporter {
    base_url: String,
    http: reqwest::Client,
    busy: AtomicBool,
}

impl CategoryImporter {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            http: reqwest::Client::new(),
            busy: AtomicBool::new(false),
        }
    }

    /// Upload a spreadsheet. Refused without a request if another upload
    /// is still in flight.
    pub async fn upload(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<ImportReport, ImportError> {
        if self.busy.swap(true, Ordering::SeqCst) {
            return Err(ImportError::Busy);
        }
        // the guard clears the flag even if this future is dropped mid-await
        let _busy = BusyGuard(&self.busy);
        self.send(file_name, bytes).await
    }

    async fn send(&self, file_name: &str, bytes: Vec<u8>) -> Result<ImportReport, ImportError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .http
            .post(format!("{}/categories/import", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(ImportError::Transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(ImportError::Transport)?;

        if status.is_success() {
            let envelope: Envelope<ImportReport> =
                serde_json::from_slice(&body).map_err(|_| ImportError::Rejected {
                    message: "Failed to import categories".into(),
                })?;
            Ok(envelope.data)
        } else {
            let message = serde_json::from_slice::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| {
                    v.pointer("/data/message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                })
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| "Failed to import categories".into());
            Err(ImportError::Rejected { message })
        }
    }
}
