//! API request handlers.

/// Stored entity lookups.
pub mod entities;
/// Health check.
pub mod health;
/// Research and planning.
pub mod research;
