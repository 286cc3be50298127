//! REST API client module for the timetable service.
//!
//! `ApiClient` is the one path through which the application reaches
//! protected endpoints: it attaches the current session's bearer token to
//! every outbound call and clears the session on authorization failures,
//! so login state has a single observer-visible source of truth.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
