//! Domain types and DTOs
//!
//! Plain data and the rules that need no database: status transitions, slot
//! arithmetic, validation, dashboard aggregation and 2FA code handling.

pub mod appointments;
pub mod auth;
pub mod branding;
pub mod profiles;
pub mod schedules;
pub mod services;
pub mod stats;
pub mod two_factor;
