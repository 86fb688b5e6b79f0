//! Common utilities and types for DevDAO

pub mod config;
pub mod error;
pub mod logging;
pub mod utils;

pub use config::Configuration;
pub use error::{Error, Result};
pub use utils::{Clock, ManualClock, SystemClock, Timestamp};
