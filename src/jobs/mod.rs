// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Asynchronous Jobs
//!
//! Long-running chain operations are submitted to the [`WorkerPool`] and
//! tracked as [`Job`] records in a [`JobStore`]. Callers get the job back
//! immediately and poll it through the [`JobService`].

pub mod pool;
pub mod service;
pub mod types;

pub use pool::{BoxError, JobContext, JobFuture, WorkerPool, INTERRUPTED_MESSAGE};
pub use service::JobService;
pub use types::{Job, JobError, JobState, JobStore, JobType};
