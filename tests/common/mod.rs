//! Common test utilities for segment-dl integration tests

#[allow(dead_code)]
pub mod backend;
#[allow(dead_code)]
pub mod config;

#[allow(unused_imports)]
pub use backend::*;
#[allow(unused_imports)]
pub use config::*;
