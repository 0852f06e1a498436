use crate::coerce::CoerceError;
use std::fmt;
use thiserror::Error;

/// The kind of record a definition error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefinitionKind {
    Option,
    Command,
    Group,
}

impl fmt::Display for DefinitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefinitionKind::Option => write!(f, "option"),
            DefinitionKind::Command => write!(f, "command"),
            DefinitionKind::Group => write!(f, "group"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{kind} name is required")]
    MissingName { kind: DefinitionKind },

    #[error("{kind} name collision on {name}")]
    DuplicateName { kind: DefinitionKind, name: String },

    #[error("short alias -{short} of option {name} is already used by option {owner}")]
    DuplicateShort {
        short: char,
        name: String,
        owner: String,
    },

    #[error("command {0} has no execute hook")]
    MissingExecute(String),

    #[error("registry is validated and frozen, cannot define {kind} {name}")]
    Frozen { kind: DefinitionKind, name: String },

    #[error("undefined option {name} (referenced by {referrer})")]
    UndefinedOption { name: String, referrer: String },

    #[error("invalid value for {target}: {source}")]
    InvalidValue {
        target: String,
        #[source]
        source: CoerceError,
    },

    #[error("{0}")]
    Arguments(String),

    #[error("unknown command {0}")]
    UnknownCommand(String),

    #[error("missing action: {0}")]
    MissingAction(String),

    #[error("deferred {0} was dropped before it settled")]
    Abandoned(String),

    #[error("{message}")]
    Command { message: String, code: Option<i32> },

    #[error("Render error: {0}")]
    Render(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

impl Error {
    /// A runtime failure raised by a hook or command body.
    pub fn command(message: impl Into<String>) -> Self {
        Error::Command {
            message: message.into(),
            code: None,
        }
    }

    /// Attaches an exit code to a [`Error::Command`]; other variants are returned as-is.
    pub fn with_code(self, code: i32) -> Self {
        match self {
            Error::Command { message, .. } => Error::Command {
                message,
                code: Some(code),
            },
            other => other,
        }
    }

    /// The exit code this error declares, if any.
    ///
    /// Argument errors follow clap's usage convention and declare `2`.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::Command { code, .. } => *code,
            Error::Arguments(_) => Some(2),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_error_carries_code() {
        let err = Error::command("boom").with_code(3);
        assert_eq!(err.code(), Some(3));
        assert_eq!(err.to_string(), "boom");
    }

    #[test]
    fn with_code_ignores_other_variants() {
        let err = Error::UnknownCommand("nope".into()).with_code(5);
        assert_eq!(err.code(), None);
    }

    #[test]
    fn duplicate_name_message_names_identifier() {
        let err = Error::DuplicateName {
            kind: DefinitionKind::Command,
            name: "query".into(),
        };
        assert_eq!(err.to_string(), "command name collision on query");
    }
}
