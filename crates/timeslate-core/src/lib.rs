//! Core library for timeslate, a client for an academic timetable service.
//!
//! This crate owns the session/authentication lifecycle - acquiring,
//! holding, persisting, refreshing, and propagating a bearer token - and
//! the authenticated API client the rest of the application uses to reach
//! protected endpoints. Rendering, forms, and navigation live in the
//! application crates that consume this library.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{GuardState, Session, SessionGuard, SessionService};
pub use config::Config;
pub use models::Principal;
