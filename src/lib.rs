//! Bowser library exports for the binary and integration tests

pub mod app;
pub mod core;
pub mod dom;
pub mod systems;

#[cfg(test)]
pub mod test_support;

pub use app::{AppError, Browser};
