//! Template sources, embedded at compile time.

pub const HELP_TEMPLATE: &str = include_str!("templates/help.tmp");
