//! Mediagate Web - HTTP media endpoints

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
#![deny(clippy::missing_panics_doc)]
//!
//! Download, view and filtered-image endpoints backed by the core gateway,
//! with bearer-token authentication and static serving of cached renditions.

pub mod auth;
pub mod handlers;
pub mod server;

// Re-export main types
pub use auth::Authenticator;
pub use server::{AppState, ServerError, build_router, run_server};
