//! Progress reporting for pipeline runs.

use super::{AttemptError, RunReport};

/// What happened to a single instrument within an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentOutcome {
    Uploaded { rows: usize, bytes: usize },
    /// No history in range; nothing was encoded or uploaded.
    SkippedEmpty,
}

/// Progress callback for pipeline runs.
pub trait RunProgress: Send {
    /// Called when a whole-run attempt begins, before login.
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32);

    /// Called after enumeration with the number of instruments that will
    /// be processed (after any limit is applied).
    fn on_instruments_listed(&self, count: usize);

    /// Called before fetching an instrument.
    fn on_instrument_start(&self, code: &str, index: usize, total: usize);

    /// Called when an instrument finishes.
    fn on_instrument_done(
        &self,
        code: &str,
        index: usize,
        total: usize,
        outcome: &InstrumentOutcome,
    );

    /// Called when an attempt fails. The run backs off and retries if
    /// `will_retry` is true, otherwise the failure is terminal.
    fn on_attempt_failed(&self, attempt: u32, error: &AttemptError, will_retry: bool);

    /// Called once when the run ends in success.
    fn on_run_complete(&self, report: &RunReport);
}

/// Simple progress reporter that prints to stdout.
pub struct StdoutProgress;

impl RunProgress for StdoutProgress {
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        println!("Attempt {attempt}/{max_attempts}: opening session...");
    }

    fn on_instruments_listed(&self, count: usize) {
        println!("  {count} instruments to process");
    }

    fn on_instrument_start(&self, code: &str, index: usize, total: usize) {
        println!("[{}/{}] Fetching {code}...", index + 1, total);
    }

    fn on_instrument_done(
        &self,
        code: &str,
        _index: usize,
        _total: usize,
        outcome: &InstrumentOutcome,
    ) {
        match outcome {
            InstrumentOutcome::Uploaded { rows, bytes } => {
                println!("  OK: {code} ({rows} rows, {bytes} bytes)");
            }
            InstrumentOutcome::SkippedEmpty => println!("  SKIP: {code} (no history)"),
        }
    }

    fn on_attempt_failed(&self, attempt: u32, error: &AttemptError, will_retry: bool) {
        if will_retry {
            println!("  FAIL: attempt {attempt} in {} phase: {error}; retrying after backoff", error.phase());
        } else {
            println!("  FAIL: attempt {attempt} in {} phase: {error}; giving up", error.phase());
        }
    }

    fn on_run_complete(&self, report: &RunReport) {
        println!(
            "\nSync complete: {}/{} uploaded, {} skipped empty, {} attempt(s)",
            report.uploaded, report.instruments, report.skipped_empty, report.attempts
        );
    }
}

/// No-op progress reporter for quiet contexts and tests.
pub struct SilentProgress;

impl RunProgress for SilentProgress {
    fn on_attempt_start(&self, _attempt: u32, _max_attempts: u32) {}
    fn on_instruments_listed(&self, _count: usize) {}
    fn on_instrument_start(&self, _code: &str, _index: usize, _total: usize) {}
    fn on_instrument_done(
        &self,
        _code: &str,
        _index: usize,
        _total: usize,
        _outcome: &InstrumentOutcome,
    ) {
    }
    fn on_attempt_failed(&self, _attempt: u32, _error: &AttemptError, _will_retry: bool) {}
    fn on_run_complete(&self, _report: &RunReport) {}
}
