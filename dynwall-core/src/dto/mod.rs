//! Data Transfer Objects (DTOs)
//!
//! Request and response payloads for the HTTP surface.

pub mod job;
