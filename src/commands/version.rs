//! Version command implementation

use crate::cli::VersionArgs;
use crate::commands::print_structured;
use crate::error::Result;
use owo_colors::OwoColorize;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub os: &'static str,
    pub arch: &'static str,
}

impl VersionInfo {
    pub fn current() -> Self {
        VersionInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
        }
    }
}

/// Execute the version command
pub fn run_version(args: &VersionArgs) -> Result<()> {
    let info = VersionInfo::current();
    match args.output {
        Some(output) => print_structured(&info, output),
        None => {
            println!("{} version {} ({}/{})", info.name.bold(), info.version.green(), info.os, info.arch);
            Ok(())
        }
    }
}
