//! Shared types for the Virtual Executive workspace.
//!
//! Record types mirror the rows kept by `vexec-storage`; the [`tasks`] and
//! [`analytics`] modules hold the pure bookkeeping logic (task derivation,
//! task statistics, score trends, KPI summaries) so it can be tested without a
//! database.

pub mod analytics;
pub mod id;
pub mod tasks;
pub mod types;
