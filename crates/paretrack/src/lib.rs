#![doc = include_str!("../../../README.md")]

pub use paretrack_core::*;
pub use paretrack_server as server;
