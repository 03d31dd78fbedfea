//! kcst API Library
//!
//! This crate provides the HTTP API handlers and application setup for the
//! temporary file host.

pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
mod utils;

// Re-exports
pub use error::HttpAppError;
pub use state::AppState;
