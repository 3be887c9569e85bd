//! Integration tests for Mediagate
//!
//! These tests drive the HTTP router end to end: configuration, catalog,
//! filesystem provider, caches and filters all take part, as in a
//! deployment.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/download_endpoints.rs"]
mod download_endpoints;
#[path = "integration/filter_endpoints.rs"]
mod filter_endpoints;
#[path = "integration/view_endpoints.rs"]
mod view_endpoints;
