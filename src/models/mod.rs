//! Data models for the gift registry application.
//!
//! Field names serialize in camelCase, the shape stored and served to clients.

mod gift;
mod payment;
mod requests;

pub use gift::*;
pub use payment::*;
pub use requests::*;
