//! Batch image generation for vocabulary word lists.
//!
//! Words are turned into short visual descriptions, composed into image
//! prompts, rendered by a queued image service and saved locally, with a
//! ledger that makes long runs resumable.

#![allow(clippy::multiple_crate_versions)]
#![deny(clippy::all)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::complexity)]
#![deny(clippy::correctness)]
#![deny(clippy::disallowed_methods)]
#![deny(clippy::expect_used)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::panic)]
#![deny(clippy::perf)]
#![deny(clippy::trivially_copy_pass_by_ref)]
#![deny(clippy::unreachable)]
#![deny(clippy::unwrap_used)]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod batch;
pub mod cli;
pub mod config;
pub mod constants;
pub mod descriptions;
pub mod error;
pub mod image_job;
pub mod ledger;
pub mod prompt;
pub mod storage;
pub mod words;
