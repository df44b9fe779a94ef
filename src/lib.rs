// Library exports for integration tests and the headless driver

pub mod catalog;
pub mod config;
pub mod controller;
pub mod playback;

// Test support (only available with test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
