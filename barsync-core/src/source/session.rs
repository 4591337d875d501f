//! Market session trait and structured error types.
//!
//! The MarketSession trait abstracts over the provider's login/query/logout
//! lifecycle so the pipeline can be driven by the real quote gateway or by
//! scripted doubles in tests.

use crate::bar::Bar;
use chrono::NaiveDate;
use thiserror::Error;

/// Structured error types for session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("login rejected (code {code}): {msg}")]
    AuthRejected { code: String, msg: String },

    #[error("provider error (code {code}): {msg}")]
    ErrorCode { code: String, msg: String },

    #[error("transport: {0}")]
    Transport(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("session not open")]
    NotOpen,
}

/// A provider session with a login/query/logout lifecycle.
///
/// Queries are only valid between a successful `open` and `close`. One
/// session serves one pipeline attempt; the orchestrator reopens on retry.
pub trait MarketSession: Send {
    /// Establish a session. Must succeed before any query.
    fn open(&mut self) -> Result<(), SessionError>;

    /// All known instrument codes, in provider order.
    ///
    /// An empty list is not an error here; the caller decides what an
    /// empty universe means.
    fn list_instruments(&mut self) -> Result<Vec<String>, SessionError>;

    /// Daily back-adjusted bars for one instrument over `[start, end]`
    /// inclusive, chronological. Empty if the instrument has no data in
    /// range.
    fn fetch_history(
        &mut self,
        code: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, SessionError>;

    /// Release the session. Best-effort and idempotent: safe to call
    /// after a failed `open`, mid-query, or twice.
    fn close(&mut self);
}
