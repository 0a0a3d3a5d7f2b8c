//! Client-facing workflows built on the registry service.

mod admin;
mod guard;
mod reservation;

pub use admin::*;
pub use guard::*;
pub use reservation::*;
