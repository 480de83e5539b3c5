//! Integration test utilities for the gateway client
//!
//! This crate provides a scripted mock gateway server and fixtures for
//! end-to-end session tests.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
