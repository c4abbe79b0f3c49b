//! API-friendly types, as received from and returned to clients.

pub mod auth;
pub mod candidate;
pub mod message;
pub mod tally;
pub mod user;
