use crate::error::Result;
use console::Term;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const DEFAULT_ARGV_PADDING: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Whether styled output should carry ANSI codes.
    pub fn resolve(self) -> bool {
        match self {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => Term::stdout().features().colors_supported(),
        }
    }
}

/// Program-level settings, usually embedded by the host binary or read from JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgramConfig {
    /// Heading printed above the help listing.
    #[serde(default)]
    pub title: Option<String>,

    /// Command run when no command name is given.
    #[serde(default)]
    pub default_command: Option<String>,

    /// Leading positionals discarded before command resolution (interpreter and script path).
    #[serde(default = "default_argv_padding")]
    pub argv_padding: usize,

    #[serde(default)]
    pub color: ColorChoice,

    /// Report the full error source chain instead of the top message.
    #[serde(default)]
    pub trace_errors: bool,
}

fn default_argv_padding() -> usize {
    DEFAULT_ARGV_PADDING
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            title: None,
            default_command: None,
            argv_padding: DEFAULT_ARGV_PADDING,
            color: ColorChoice::Auto,
            trace_errors: false,
        }
    }
}

impl ProgramConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load config from a JSON file, or return defaults if it does not exist
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}
