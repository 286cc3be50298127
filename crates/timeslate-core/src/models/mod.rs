//! Data models for timeslate entities.
//!
//! This module contains the data structures exchanged with the timetable
//! service:
//!
//! - `Principal`: the authenticated identity record
//! - `TokenResponse`: credential endpoint response
//! - `Timetable`, `ScheduleEntry`: timetable data fetched through the
//!   authenticated client

pub mod person;
pub mod timetable;

pub use person::{Principal, TokenResponse};
pub use timetable::{ScheduleEntry, Timetable};
