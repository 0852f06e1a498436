//! # CLI Layer
//!
//! The `cmdkit` binary is a small package browser built on the library: it declares its groups,
//! options and commands, then hands raw argv to the engine. Everything that touches the process
//! (argv, exit codes) stays in `main.rs`.
//!
//! - [`options`]: option declarations and their side effects (`--color`, `--verbose`)
//! - [`commands`]: `version`, `settings` and `query` (with the `install` action)

pub mod commands;
pub mod options;

use cmdkit::output::{names, DEFAULT_THEME};
use cmdkit::sort::by_group_priority;
use cmdkit::{logging, Program, ProgramBuilder, ProgramConfig, Result};
use console::Style;
use futures::FutureExt;
use once_cell::sync::Lazy;
use options::group;

/// `0.3.2` for release builds, `0.3.2@abc1234` otherwise.
pub static VERSION_STRING: Lazy<String> = Lazy::new(|| {
    let build = env!("CMDKIT_BUILD");
    if build.is_empty() {
        commands::VERSION.to_string()
    } else {
        format!("{}@{build}", commands::VERSION)
    }
});

pub fn program() -> Result<Program> {
    let config = ProgramConfig {
        title: Some("cmdkit: package browser".into()),
        argv_padding: 1,
        ..ProgramConfig::default()
    };
    let mut builder = ProgramBuilder::new(config);
    builder.theme(
        DEFAULT_THEME
            .clone()
            .add(names::COMMAND, Style::new().green().bold())
            .add(names::HEADER, Style::new().bold().underlined()),
    );

    builder
        .define_group(|g| {
            g.name = group::QUERY.into();
            g.label = "Main commands".into();
            g.options = vec![
                options::names::CONFIG.into(),
                options::names::LIMIT.into(),
                options::names::MAX.into(),
            ];
            g.sorter = by_group_priority([group::QUERY, group::SUPPORT, group::HELP]);
        })?
        .define_group(|g| {
            g.name = group::SUPPORT.into();
            g.label = "Support commands".into();
            g.options = vec![options::names::CONFIG.into()];
        })?
        .define_group(|g| {
            g.name = group::HELP.into();
            g.label = "Help commands".into();
        })?;

    options::define(&mut builder)?;
    commands::define(&mut builder)?;

    builder.before(|ctx| {
        async move {
            logging::init(0);
            let out = ctx.out();
            out.line(&format!(
                "cmdkit {} {}",
                *VERSION_STRING,
                out.paint(names::ACCENT, "(preview)")
            ))
        }
        .boxed()
    });

    builder.build()
}
