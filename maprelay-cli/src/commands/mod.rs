//! CLI command implementations.
//!
//! - [`config`] - Show or create the configuration file
//! - [`fetch`] - Fetch resources from concurrent workers

pub mod config;
pub mod fetch;
