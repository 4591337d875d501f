//! Barsync Core — full-history sync: session, encoder, uploader, pipeline.
//!
//! This crate contains everything except the CLI surface:
//! - Bar domain type and history validation
//! - MarketSession trait and the quote-gateway adapter
//! - Parquet payload encoder with lossless round trip
//! - Uploader trait with HTTP and dry-run implementations
//! - Pipeline orchestrator with injected whole-run retry policy
//! - Environment configuration

pub mod bar;
pub mod config;
pub mod encode;
pub mod pipeline;
pub mod source;
pub mod upload;
