// SPDX-License-Identifier: PMPL-1.0-or-later
//! Scheduling primitives for the audit pipeline

pub mod limiter;
pub mod retry;

pub use limiter::{WorkerLimiter, WorkerPermit};
pub use retry::RetryPolicy;
