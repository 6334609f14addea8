//! Custom resource types the webhook validates.
//!
//! - `Configuration`: Akri device discovery configuration (`akri.sh/v0`)

mod configuration;

pub use configuration::*;
