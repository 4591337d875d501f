//! Pipeline orchestrator.
//!
//! Drives one sync run: open session, enumerate instruments, then per
//! instrument fetch, encode, upload, in enumeration order. Any failure
//! aborts the whole attempt; the session is closed and the run restarts
//! from login after a fixed backoff, bounded by the retry policy. There
//! is no per-instrument isolation and no mid-list resume: a retried
//! attempt re-enumerates and reprocesses everything, which keeps the
//! no-silent-skips guarantee without a persisted checkpoint.

pub mod progress;
pub mod retry;

pub use progress::{InstrumentOutcome, RunProgress, SilentProgress, StdoutProgress};
pub use retry::RetryPolicy;

use crate::encode::{self, EncodeError};
use crate::source::{MarketSession, SessionError};
use crate::upload::{UploadError, Uploader};
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;
use tracing::{info, warn};

/// Options for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Process only the first N enumerated instruments (smoke runs).
    pub limit: Option<usize>,
}

impl RunOptions {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            limit: None,
        }
    }
}

/// Pipeline phase, for per-phase status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Open,
    Enumerate,
    Fetch,
    Encode,
    Upload,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Open => "open",
            Phase::Enumerate => "enumerate",
            Phase::Fetch => "fetch",
            Phase::Encode => "encode",
            Phase::Upload => "upload",
        };
        f.write_str(name)
    }
}

/// Error failing a single whole-run attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("session open: {0}")]
    Open(#[source] SessionError),

    #[error("enumeration: {0}")]
    Enumerate(#[source] SessionError),

    #[error("provider listed no instruments")]
    NoInstruments,

    #[error("fetch {code}: {source}")]
    Fetch {
        code: String,
        #[source]
        source: SessionError,
    },

    #[error("encode {code}: {source}")]
    Encode {
        code: String,
        #[source]
        source: EncodeError,
    },

    #[error("upload {code}: {source}")]
    Upload {
        code: String,
        #[source]
        source: UploadError,
    },
}

impl AttemptError {
    /// The phase this attempt failed in.
    pub fn phase(&self) -> Phase {
        match self {
            AttemptError::Open(_) => Phase::Open,
            AttemptError::Enumerate(_) | AttemptError::NoInstruments => Phase::Enumerate,
            AttemptError::Fetch { .. } => Phase::Fetch,
            AttemptError::Encode { .. } => Phase::Encode,
            AttemptError::Upload { .. } => Phase::Upload,
        }
    }
}

/// Terminal pipeline error: every allowed attempt failed.
#[derive(Debug, Error)]
#[error("all {attempts} attempt(s) failed, last error: {last}")]
pub struct RunError {
    pub attempts: u32,
    pub last: AttemptError,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub attempts: u32,
    pub instruments: usize,
    pub uploaded: usize,
    pub skipped_empty: usize,
}

struct AttemptTotals {
    instruments: usize,
    uploaded: usize,
    skipped_empty: usize,
}

/// Run the full pipeline until one attempt succeeds or the retry budget
/// is spent.
///
/// The session is closed after every attempt, successful or not; close
/// failures are logged by the session and never affect the outcome.
pub fn run(
    session: &mut dyn MarketSession,
    uploader: &dyn Uploader,
    opts: &RunOptions,
    policy: &RetryPolicy,
    progress: &dyn RunProgress,
) -> Result<RunReport, RunError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        progress.on_attempt_start(attempt, policy.max_attempts());

        let result = run_attempt(session, uploader, opts, progress);
        session.close();

        match result {
            Ok(totals) => {
                let report = RunReport {
                    attempts: attempt,
                    instruments: totals.instruments,
                    uploaded: totals.uploaded,
                    skipped_empty: totals.skipped_empty,
                };
                info!(
                    attempts = report.attempts,
                    instruments = report.instruments,
                    uploaded = report.uploaded,
                    skipped_empty = report.skipped_empty,
                    "sync complete"
                );
                progress.on_run_complete(&report);
                return Ok(report);
            }
            Err(e) => {
                let will_retry = attempt < policy.max_attempts();
                warn!(attempt, phase = %e.phase(), error = %e, will_retry, "attempt failed");
                progress.on_attempt_failed(attempt, &e, will_retry);
                if !will_retry {
                    return Err(RunError { attempts: attempt, last: e });
                }
                policy.wait();
            }
        }
    }
}

/// One whole-run attempt: login through the last instrument.
fn run_attempt(
    session: &mut dyn MarketSession,
    uploader: &dyn Uploader,
    opts: &RunOptions,
    progress: &dyn RunProgress,
) -> Result<AttemptTotals, AttemptError> {
    session.open().map_err(AttemptError::Open)?;

    let mut codes = session.list_instruments().map_err(AttemptError::Enumerate)?;
    // An empty universe is a provider hiccup, not a truth about the
    // market; treat it as transient and let the retry loop handle it.
    if codes.is_empty() {
        return Err(AttemptError::NoInstruments);
    }
    if let Some(limit) = opts.limit {
        codes.truncate(limit);
    }
    progress.on_instruments_listed(codes.len());

    let total = codes.len();
    let mut uploaded = 0;
    let mut skipped_empty = 0;

    for (i, code) in codes.iter().enumerate() {
        progress.on_instrument_start(code, i, total);

        let bars = session
            .fetch_history(code, opts.start, opts.end)
            .map_err(|source| AttemptError::Fetch {
                code: code.clone(),
                source,
            })?;

        let outcome = if bars.is_empty() {
            skipped_empty += 1;
            InstrumentOutcome::SkippedEmpty
        } else {
            let payload = encode::encode(&bars).map_err(|source| AttemptError::Encode {
                code: code.clone(),
                source,
            })?;
            let bytes = payload.bytes().len();
            uploader
                .upload(code, &payload)
                .map_err(|source| AttemptError::Upload {
                    code: code.clone(),
                    source,
                })?;
            uploaded += 1;
            InstrumentOutcome::Uploaded {
                rows: payload.rows(),
                bytes,
            }
        };

        progress.on_instrument_done(code, i, total, &outcome);
    }

    Ok(AttemptTotals {
        instruments: total,
        uploaded,
        skipped_empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_error_maps_to_phase() {
        assert_eq!(
            AttemptError::Open(SessionError::NotOpen).phase(),
            Phase::Open
        );
        assert_eq!(AttemptError::NoInstruments.phase(), Phase::Enumerate);
        assert_eq!(
            AttemptError::Fetch {
                code: "sh.600000".into(),
                source: SessionError::NotOpen,
            }
            .phase(),
            Phase::Fetch
        );
    }

    #[test]
    fn phase_display_is_lowercase() {
        assert_eq!(Phase::Enumerate.to_string(), "enumerate");
        assert_eq!(Phase::Upload.to_string(), "upload");
    }
}
