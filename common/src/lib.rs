//! Ratewise Common Types
//!
//! Shared types used across the ratewise crates: currency codes and the
//! supported-currency allow-list, monetary amounts, and time utilities.

pub mod monetary;
pub mod time;

pub use monetary::*;
pub use time::*;
