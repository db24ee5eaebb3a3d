//! Shared test utilities for vidscreen integration tests.
//!
//! This module provides:
//! - In-memory fakes of every external collaborator
//! - `TestHarness` wiring a `WorkerContext` over an in-memory database

#![allow(dead_code)]

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
