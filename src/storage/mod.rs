//! Persistence for work periods.
//! The basic idea is:
//!  - There is a single append-mostly log file under the application
//!    directory, one JSON object per line.
//!  - The daemon appends a period when a work session starts and keeps
//!    rewriting that period's line as the session goes on.
//!  - Readers get the periods back in the order they were written, which is
//!    ascending by begin.

pub mod entities;
pub mod period_store;
