//! gardenctl - target Gardener landscapes and configure your shell for them

pub mod access;
pub mod allowpattern;
pub mod cli;
pub mod commands;
pub mod config;
pub mod credvalidate;
pub mod env;
pub mod error;
pub mod fsutil;
pub mod garden;
pub mod manager;
pub mod providerenv;
pub mod resolver;
pub mod session;
pub mod target;

/// Name of the binary, used in generated scripts and history records
pub const CLI_NAME: &str = "gardenctl";
