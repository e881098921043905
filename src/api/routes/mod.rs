//! Route handlers for the HTTP API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Submission and status polling
//! - [`system`] - Health and OpenAPI

mod jobs;
mod system;

// Re-export all handlers so `routes::function_name` works
pub use jobs::*;
pub use system::*;
