//! Common test utilities for buildcache scenario tests.
//!
//! This module provides:
//! - `TestEnv`: Isolated project and cache directories
//! - `FakeEngine`: Scriptable build engine that counts its builds
//! - Fixtures: Config content and cache file builders

#![allow(dead_code)]

pub mod engine;
pub mod env;
pub mod fixtures;

pub use engine::*;
pub use env::*;
pub use fixtures::*;
