//! rdeploy - push files to remote hosts
//!
//! This crate provides both a library and CLI for rdeploy, including:
//! - Configuration file parsing and merging
//! - Wire record encoding with optional gzip compression
//! - Length-prefixed framing over TCP
//! - Sequential delivery to every host of a deploy target

pub mod commands;
pub mod config;
pub mod deploy;
pub mod error;

pub use error::{Error, Result};
