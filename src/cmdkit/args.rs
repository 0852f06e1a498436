//! Turning raw argv into an [`ArgBag`].
//!
//! The bag keeps positionals in order and named values as raw text. A bare occurrence
//! (`--verbose`, `-v`) is recorded as a native `true` so coercion can tell "present without a
//! value" apart from an explicit empty string.
//!
//! [`ClapTokenizer`] derives a `clap::Command` from the registry on every call: one optional-value
//! arg per declared option plus a catch-all positional. Flags and booleans only take a value
//! through `=` so `--verbose query` leaves `query` positional.

use crate::error::{Error, Result};
use crate::registry::Registry;
use clap::parser::ValueSource;
use clap::{value_parser, Arg, ArgAction, Command};
use std::borrow::Cow;
use std::collections::HashMap;

const POSITIONAL: &str = "__positional";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Str(String),
    Bool(bool),
}

impl RawValue {
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            RawValue::Str(s) => Cow::Borrowed(s),
            RawValue::Bool(b) => Cow::Owned(b.to_string()),
        }
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Str(s.to_string())
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Bool(b)
    }
}

/// Tokenized command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArgBag {
    pub positional: Vec<String>,
    pub named: HashMap<String, RawValue>,
}

impl ArgBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: &str) -> Self {
        self.positional.push(value.to_string());
        self
    }

    pub fn opt(mut self, name: &str, value: impl Into<RawValue>) -> Self {
        self.named.insert(name.to_string(), value.into());
        self
    }
}

/// Converts argv into an [`ArgBag`]. Failures should be [`Error::Arguments`].
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, registry: &Registry, argv: &[String]) -> Result<ArgBag>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ClapTokenizer;

impl ClapTokenizer {
    fn command(registry: &Registry) -> Command {
        let name = match registry.title() {
            "" => "program".to_string(),
            title => title.to_string(),
        };
        let mut command = Command::new(name)
            .no_binary_name(true)
            .disable_help_flag(true)
            .disable_version_flag(true)
            .args_override_self(true)
            .arg(
                Arg::new(POSITIONAL)
                    .num_args(1..)
                    .action(ArgAction::Append)
                    .value_parser(value_parser!(String)),
            );

        for option in registry.options() {
            let mut arg = Arg::new(option.name.clone())
                .long(option.name.clone())
                .action(ArgAction::Set)
                .num_args(0..=1);
            if let Some(short) = option.short {
                arg = arg.short(short);
            }
            arg = if option.kind.accepts_bare() {
                arg.require_equals(true)
            } else {
                arg.allow_negative_numbers(true)
            };
            if let Some(placeholder) = &option.placeholder {
                arg = arg.value_name(placeholder.clone());
            }
            command = command.arg(arg);
        }
        command
    }
}

impl Tokenizer for ClapTokenizer {
    fn tokenize(&self, registry: &Registry, argv: &[String]) -> Result<ArgBag> {
        let matches = Self::command(registry)
            .try_get_matches_from(argv)
            .map_err(|e| Error::Arguments(e.render().to_string().trim_end().to_string()))?;

        let positional = matches
            .get_many::<String>(POSITIONAL)
            .map(|values| values.cloned().collect())
            .unwrap_or_default();

        let mut named = HashMap::new();
        for option in registry.options() {
            if matches.value_source(&option.name) != Some(ValueSource::CommandLine) {
                continue;
            }
            let value = matches
                .get_raw(&option.name)
                .and_then(|values| values.last())
                .map(|raw| RawValue::Str(raw.to_string_lossy().into_owned()))
                .unwrap_or(RawValue::Bool(true));
            named.insert(option.name.clone(), value);
        }

        Ok(ArgBag { positional, named })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::OptionType;

    fn registry() -> Registry {
        let mut registry = Registry::new("tool");
        registry
            .define_option(|opt| {
                opt.name = "verbose".into();
                opt.short = Some('v');
                opt.kind = OptionType::Flag;
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "limit".into();
                opt.kind = OptionType::Int;
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "config".into();
                opt.short = Some('c');
            })
            .unwrap();
        registry
    }

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn positionals_and_values() {
        let bag = ClapTokenizer
            .tokenize(&registry(), &argv(&["query", "--limit", "5", "foo"]))
            .unwrap();
        assert_eq!(bag.positional, ["query", "foo"]);
        assert_eq!(bag.named.get("limit"), Some(&RawValue::Str("5".into())));
        assert!(!bag.named.contains_key("verbose"));
    }

    #[test]
    fn bare_flag_does_not_swallow_positionals() {
        let bag = ClapTokenizer
            .tokenize(&registry(), &argv(&["--verbose", "query"]))
            .unwrap();
        assert_eq!(bag.positional, ["query"]);
        assert_eq!(bag.named.get("verbose"), Some(&RawValue::Bool(true)));
    }

    #[test]
    fn short_alias_maps_to_long_name() {
        let bag = ClapTokenizer
            .tokenize(&registry(), &argv(&["-v", "-c", "file.json"]))
            .unwrap();
        assert_eq!(bag.named.get("verbose"), Some(&RawValue::Bool(true)));
        assert_eq!(bag.named.get("config"), Some(&RawValue::Str("file.json".into())));
    }

    #[test]
    fn explicit_flag_value_with_equals() {
        let bag = ClapTokenizer
            .tokenize(&registry(), &argv(&["--verbose=off"]))
            .unwrap();
        assert_eq!(bag.named.get("verbose"), Some(&RawValue::Str("off".into())));
    }

    #[test]
    fn bare_value_option_becomes_native_true() {
        let bag = ClapTokenizer
            .tokenize(&registry(), &argv(&["--config"]))
            .unwrap();
        assert_eq!(bag.named.get("config"), Some(&RawValue::Bool(true)));
    }

    #[test]
    fn last_occurrence_wins() {
        let bag = ClapTokenizer
            .tokenize(&registry(), &argv(&["--limit", "1", "--limit", "2"]))
            .unwrap();
        assert_eq!(bag.named.get("limit"), Some(&RawValue::Str("2".into())));
    }

    #[test]
    fn negative_numbers_are_values() {
        let bag = ClapTokenizer
            .tokenize(&registry(), &argv(&["--limit", "-3"]))
            .unwrap();
        assert_eq!(bag.named.get("limit"), Some(&RawValue::Str("-3".into())));
    }

    #[test]
    fn unknown_option_is_an_argument_error() {
        let err = ClapTokenizer
            .tokenize(&registry(), &argv(&["--nope"]))
            .unwrap_err();
        assert!(matches!(err, Error::Arguments(ref msg) if msg.contains("--nope")));
        assert_eq!(err.code(), Some(2));
    }

    #[test]
    fn empty_argv_is_empty_bag() {
        let bag = ClapTokenizer.tokenize(&registry(), &[]).unwrap();
        assert_eq!(bag, ArgBag::new());
    }

    #[test]
    fn builder_helpers() {
        let bag = ArgBag::new().arg("a").opt("limit", "3").opt("verbose", true);
        assert_eq!(bag.positional, ["a"]);
        assert_eq!(bag.named["limit"].as_text(), "3");
        assert_eq!(bag.named["verbose"].as_text(), "true");
    }
}
