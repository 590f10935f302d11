//! Worker Factory: operator console for a fleet of remote desktop workers.

pub mod api;
pub mod auth;
pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
