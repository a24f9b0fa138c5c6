//! Dynwall Service
//!
//! Turns a light/dark image pair into a single dynamic wallpaper.
//!
//! Architecture:
//! - API: multipart submission, status and gallery endpoints (server mode)
//! - Service: submission and lookup logic behind the API
//! - Repository: durable job records
//! - Queue: at-least-once delivery of job ids to the worker
//! - Pipeline: ordered external processing stages per job
//! - Storage: artifact upload and public URL derivation
//! - Worker: the lifecycle loop driving jobs to a terminal status

pub mod api;
pub mod config;
pub mod context;
pub mod db;
pub mod pipeline;
pub mod queue;
pub mod repository;
pub mod service;
pub mod storage;
pub mod worker;
