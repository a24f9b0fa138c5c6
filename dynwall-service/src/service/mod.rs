//! Service Module
//!
//! Business logic behind the HTTP surface: submitting a wallpaper job and the
//! read-only status and gallery lookups.

pub mod wallpaper;

// Re-export for convenience
pub use wallpaper as wallpaper_service;
