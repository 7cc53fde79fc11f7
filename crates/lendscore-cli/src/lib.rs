//! LendScore CLI library - testable functions and modules
//!
//! This library provides the HTTP API and configuration layer for the
//! `lendscore` binary.

pub mod api;
pub mod config;
