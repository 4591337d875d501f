//! Payload upload to the ingestion endpoint.
//!
//! One POST per instrument: the Parquet blob as the body, the instrument
//! code and API key as headers. The endpoint's response body is logged
//! for diagnostics but never parsed; only the status class matters.
//! Retries belong to the pipeline, not here.

use crate::encode::EncodedHistory;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const API_KEY_HEADER: &str = "X-API-KEY";
pub const STOCK_CODE_HEADER: &str = "X-Stock-Code";

/// Structured error types for upload operations.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("upload rejected: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Sink for encoded histories.
///
/// Implementations must not retry internally; a failed call is reported
/// once and the caller decides what to do with the whole run.
pub trait Uploader: Send {
    fn upload(&self, code: &str, payload: &EncodedHistory) -> Result<(), UploadError>;
}

/// Production uploader POSTing to the ingestion endpoint.
pub struct HttpUploader {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl HttpUploader {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("barsync/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

impl Uploader for HttpUploader {
    fn upload(&self, code: &str, payload: &EncodedHistory) -> Result<(), UploadError> {
        // Nothing to send for an instrument with no history.
        if payload.is_empty() {
            debug!(code, "empty payload, skipping upload");
            return Ok(());
        }

        let resp = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(STOCK_CODE_HEADER, code)
            .body(payload.bytes().to_vec())
            .send()?;

        let status = resp.status();
        let body = resp.text().unwrap_or_default();

        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(code, status = status.as_u16(), body = %body, "upload accepted");
        Ok(())
    }
}

/// Uploader that logs what would be sent and succeeds without touching
/// the network. Backs the CLI's dry-run mode.
pub struct DryRunUploader;

impl Uploader for DryRunUploader {
    fn upload(&self, code: &str, payload: &EncodedHistory) -> Result<(), UploadError> {
        info!(
            code,
            rows = payload.rows(),
            bytes = payload.bytes().len(),
            "dry run, not uploading"
        );
        Ok(())
    }
}
