//! Test modules for MCP Link.
//!
//! This module contains the crate-wide testing infrastructure:
//! - Configuration loading and validation tests
//! - Error type and reporting tests
//! - Shared fixtures and proptest strategies
//!
//! Component tests live next to their components; the client facade has its
//! own fake-server suite under `client::tests`.


// Re-export commonly used testing tools to simplify imports in test modules
pub use test_utils::{create_test_dir, log_level_strategy, timeout_strategy, write_config};
