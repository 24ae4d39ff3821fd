//! Ladderforge - adaptive bitrate packager
//!
//! This library crate exposes the configuration layer for integration testing.

pub mod config;
