//! Session providers

mod interface;
pub use interface::*;

pub mod file;
pub mod memory;

#[cfg(feature = "cookie")]
pub mod cookie;

#[cfg(feature = "redis_fred")]
pub mod redis;
