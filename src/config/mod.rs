// This module re-exports important pieces for convenience,
// so we can "use crate::config::*" easily.
pub mod config;
pub mod database;
pub mod logging;

pub use config::*;
pub use database::*;
pub use logging::*;
