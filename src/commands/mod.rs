//! Command implementations

pub mod config;
pub mod kubectl_env;
pub mod provider_env;
pub mod resolve;
pub mod target;
pub mod version;

pub use config::*;
pub use kubectl_env::*;
pub use provider_env::*;
pub use resolve::*;
pub use target::*;
pub use version::*;

use crate::cli::OutputFormat;
use crate::error::Result;
use serde::Serialize;

/// Print `value` as YAML or JSON
pub fn print_structured<T: Serialize>(value: &T, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}
