//! CLI command implementations.

pub mod common;
pub mod config;
pub mod finder;
pub mod plan;
pub mod resolve;
pub mod shell;
