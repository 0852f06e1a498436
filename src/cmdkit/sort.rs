//! Orderings used by the help listing and by group sorters.

use crate::registry::{CommandDef, CommandSorter, GroupDef, OptionDef};
use std::cmp::Ordering;
use std::sync::Arc;

/// Registration index, then name.
pub fn by_index(one: &CommandDef, two: &CommandDef) -> Ordering {
    one.index()
        .cmp(&two.index())
        .then_with(|| one.name.cmp(&two.name))
}

/// Name, then registration index.
pub fn by_name(one: &CommandDef, two: &CommandDef) -> Ordering {
    one.name
        .cmp(&two.name)
        .then_with(|| one.index().cmp(&two.index()))
}

pub fn group_order(one: &GroupDef, two: &GroupDef) -> Ordering {
    one.index()
        .cmp(&two.index())
        .then_with(|| one.name.cmp(&two.name))
}

/// Options with a short alias first, then alias and name compared case-insensitively.
pub fn option_order(one: &OptionDef, two: &OptionDef) -> Ordering {
    let by_alias = match (one.short, two.short) {
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (Some(a), Some(b)) => a.to_lowercase().cmp(b.to_lowercase()),
        (None, None) => Ordering::Equal,
    };
    by_alias.then_with(|| one.name.to_lowercase().cmp(&two.name.to_lowercase()))
}

/// Puts the side that belongs to `group` first; `Equal` when both or neither do.
pub fn membership(one: &CommandDef, two: &CommandDef, group: &str) -> Ordering {
    match (one.in_group(group), two.in_group(group)) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

/// Sorter cascading over group membership in priority order, then [`by_index`].
///
/// ```rust
/// use cmdkit::sort::by_group_priority;
///
/// let sorter = by_group_priority(["query", "support", "help"]);
/// ```
pub fn by_group_priority<I, S>(groups: I) -> CommandSorter
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let groups: Vec<String> = groups.into_iter().map(Into::into).collect();
    Arc::new(move |one: &CommandDef, two: &CommandDef| {
        groups
            .iter()
            .map(|group| membership(one, two, group))
            .find(|ordering| ordering.is_ne())
            .unwrap_or_else(|| by_index(one, two))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use futures::FutureExt;

    fn registry() -> Registry {
        let mut registry = Registry::default();
        for (name, groups) in [
            ("help", vec!["help"]),
            ("query", vec!["query"]),
            ("init", vec!["support"]),
            ("version", vec!["help", "support"]),
        ] {
            registry
                .define_command(|cmd| {
                    cmd.name = name.into();
                    cmd.groups = groups.into_iter().map(String::from).collect();
                    cmd.on_execute(|_ctx| async { Ok(()) }.boxed());
                })
                .unwrap();
        }
        for (name, short) in [("verbose", None), ("Help", Some('h')), ("alpha", None), ("Version", Some('V'))] {
            registry
                .define_option(|opt| {
                    opt.name = name.into();
                    opt.short = short;
                })
                .unwrap();
        }
        registry
    }

    fn sorted_commands(registry: &Registry, sorter: &CommandSorter) -> Vec<String> {
        let mut commands: Vec<&CommandDef> = registry.commands().iter().collect();
        commands.sort_by(|a, b| sorter(a, b));
        commands.iter().map(|c| c.name.clone()).collect()
    }

    #[test]
    fn index_and_name_orders() {
        let registry = registry();
        let mut commands: Vec<&CommandDef> = registry.commands().iter().collect();
        commands.sort_by(|a, b| by_name(a, b));
        let names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["help", "init", "query", "version"]);

        commands.sort_by(|a, b| by_index(a, b));
        let names: Vec<&str> = commands.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["help", "query", "init", "version"]);
    }

    #[test]
    fn options_with_alias_come_first() {
        let registry = registry();
        let mut options: Vec<&OptionDef> = registry.options().iter().collect();
        options.sort_by(|a, b| option_order(a, b));
        let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["Help", "Version", "alpha", "verbose"]);
    }

    #[test]
    fn priority_cascades_over_groups() {
        let registry = registry();
        let sorter = by_group_priority(["query", "support", "help"]);
        assert_eq!(
            sorted_commands(&registry, &sorter),
            ["query", "version", "init", "help"]
        );
    }

    #[test]
    fn priority_falls_back_to_index() {
        let registry = registry();
        let sorter = by_group_priority(Vec::<String>::new());
        assert_eq!(
            sorted_commands(&registry, &sorter),
            ["help", "query", "init", "version"]
        );
    }
}
