//! Attendance time-edit approval service.
//!
//! Managers propose corrections to recorded clock-in/clock-out times, admins
//! apply them directly or approve/reject pending proposals, and every change
//! lands in an append-only per-record change log.

pub mod api;
pub mod approval;
pub mod auth;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod model;
pub mod models;
pub mod routes;
pub mod store;
pub mod utils;
