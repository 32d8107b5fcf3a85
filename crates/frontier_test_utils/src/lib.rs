//! # Frontier Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Determinism test harness
//! - Reference scenario fixtures
//! - In-process lockstep loopback
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod determinism;
pub mod fixtures;
pub mod loopback;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
