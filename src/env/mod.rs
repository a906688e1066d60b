//! Shell support for the generated environment scripts

mod escape;
pub mod template;

pub use escape::{escape_fish, escape_posix, escape_powershell, strip_unsafe};
pub use template::Template;

use crate::error::GctlError;
use clap::ValueEnum;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Shells scripts can be generated for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

impl Shell {
    pub const ALL: [Shell; 4] = [Shell::Bash, Shell::Zsh, Shell::Fish, Shell::Powershell];

    pub fn as_str(&self) -> &'static str {
        match self {
            Shell::Bash => "bash",
            Shell::Zsh => "zsh",
            Shell::Fish => "fish",
            Shell::Powershell => "powershell",
        }
    }

    /// The snippet that evaluates the output of `cmd` in this shell
    pub fn eval_command(&self, cmd: &str) -> String {
        match self {
            Shell::Fish => format!("eval ({cmd})"),
            // Invoke-Expression cannot evaluate multi-line functions
            Shell::Powershell => format!("& {cmd} | Invoke-Expression"),
            Shell::Bash | Shell::Zsh => format!("eval \"$({cmd})\""),
        }
    }

    /// A typical prompt, used when showing commands to run
    pub fn prompt(&self) -> &'static str {
        match self {
            Shell::Powershell if cfg!(windows) => "PS C:\\> ",
            Shell::Powershell => "PS /> ",
            _ => "$ ",
        }
    }

    /// The startup file users would add the eval command to
    pub fn config_file(&self) -> &'static str {
        match self {
            Shell::Bash => "~/.bashrc",
            Shell::Zsh => "~/.zshrc",
            Shell::Fish => "~/.config/fish/config.fish",
            Shell::Powershell => "$profile",
        }
    }

    /// Quote every value as a single literal, joined by spaces
    pub fn escape<S: AsRef<str>>(&self, values: &[S]) -> String {
        let quote: fn(&str) -> String = match self {
            Shell::Bash | Shell::Zsh => escape_posix,
            Shell::Fish => escape_fish,
            Shell::Powershell => escape_powershell,
        };
        values
            .iter()
            .map(|v| quote(v.as_ref()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shell {
    type Err = GctlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shell::ALL.into_iter().find(|shell| shell.as_str() == s).ok_or_else(|| {
            let valid: Vec<_> = Shell::ALL.iter().map(Shell::as_str).collect();
            GctlError::InvalidArgument(format!("invalid shell given, must be one of [{}]", valid.join(" ")))
        })
    }
}
