//! Core domain types
//!
//! The server creates jobs (for persistence and enqueueing) and the worker
//! moves them through their lifecycle. Both sides share these structures.

pub mod job;
