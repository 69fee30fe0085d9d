//! CLI command implementations.

pub mod common;
pub mod install;
pub mod status;
pub mod uninstall;
