//! Common test utilities and helpers for engine integration tests.
//!
//! This module provides shared functionality across the integration tests:
//! - Test fixtures (process trees, an engine harness)
//! - Custom assertions
//! - Mock host collaborators

pub mod assertions;
pub mod fixtures;
pub mod mock_hosts;

#[allow(unused_imports)]
pub use assertions::*;
pub use fixtures::*;
#[allow(unused_imports)]
pub use mock_hosts::*;
