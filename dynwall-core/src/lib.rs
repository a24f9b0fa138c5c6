//! Dynwall Core
//!
//! Core types shared by the dynwall server and worker.
//!
//! This crate contains:
//! - Domain types: the wallpaper job and its status state machine
//! - DTOs: payloads exchanged with HTTP clients

pub mod domain;
pub mod dto;
