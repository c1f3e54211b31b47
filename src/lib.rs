// Library exports for the binary and integration tests

pub mod analyzer;
pub mod config;
pub mod database;
pub mod discid;
pub mod identify;
pub mod index;
pub mod robot;

// Test support (unit tests, and integration tests with the test-utils feature)
#[cfg(any(test, feature = "test-utils"))]
pub mod test_support;
