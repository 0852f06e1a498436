//! # Help Listing
//!
//! Builds the grouped usage listing from a [`Registry`].
//!
//! Layout stays in Rust: rows are collected into three columns (usage, short alias,
//! description), padded by display width with `unicode-width`, and handed to the help template.
//! The template only picks styles for each cell.
//!
//! ```text
//! Main commands
//! --------         ----  --------
//!    query <pattern>       search the catalog
//!       --limit <n>        : max results (int, default: 10)
//! ```
//!
//! Section order:
//!
//! 1. every group in group order: header, divider, member commands (group sorter), and after a
//!    divider the group's own options
//! 2. commands in no group under `other commands`
//! 3. `global options`: command-bound options (`--help`, `--version`) then plain globals
//!
//! A command lists only the options not already shown for its group or under global options.

use crate::error::Result;
use crate::output::{names, render_template, Theme};
use crate::registry::{CommandDef, OptionDef, Registry};
use crate::sort;
use crate::templates::HELP_TEMPLATE;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use unicode_width::UnicodeWidthStr;

const COLUMN_GAP: &str = "  ";
const COMMAND_INDENT: &str = "   ";
const OPTION_INDENT: &str = "      ";
const DESCRIPTION_LEAD: &str = " : ";
const DETAIL_INDENT: &str = "   ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowKind {
    Header,
    Divider,
    Command,
    Option,
    Detail,
    Blank,
}

impl RowKind {
    fn styles(self) -> (&'static str, &'static str) {
        match self {
            RowKind::Header => (names::HEADER, names::PLAIN),
            RowKind::Divider => (names::DIVIDER, names::DIVIDER),
            RowKind::Command => (names::COMMAND, names::LABEL),
            RowKind::Option => (names::OPTION, names::DESCRIPTION),
            RowKind::Detail | RowKind::Blank => (names::PLAIN, names::NOTE),
        }
    }
}

#[derive(Debug)]
struct Row {
    kind: RowKind,
    one: String,
    short: String,
    two: String,
}

impl Row {
    fn new(kind: RowKind) -> Self {
        Self {
            kind,
            one: String::new(),
            short: String::new(),
            two: String::new(),
        }
    }
}

#[derive(Serialize)]
struct RowData {
    one: String,
    one_style: &'static str,
    one_gap: String,
    short: String,
    short_gap: String,
    two: String,
    two_style: &'static str,
}

#[derive(Serialize)]
struct HelpData {
    title: Option<String>,
    rows: Vec<RowData>,
}

struct HelpTable<'r> {
    registry: &'r Registry,
    rows: Vec<Row>,
    command_bound: Vec<String>,
}

impl<'r> HelpTable<'r> {
    fn new(registry: &'r Registry) -> Self {
        let command_bound = sorted_options(registry.options())
            .into_iter()
            .filter(|option| option.command.is_some())
            .map(|option| option.name.clone())
            .collect();
        Self {
            registry,
            rows: Vec::new(),
            command_bound,
        }
    }

    fn header(&mut self, label: &str) {
        let mut row = Row::new(RowKind::Header);
        row.one = label.to_string();
        self.rows.push(row);
        self.divider();
    }

    fn divider(&mut self) {
        self.rows.push(Row {
            kind: RowKind::Divider,
            one: "--------".into(),
            short: "----".into(),
            two: "--------".into(),
        });
    }

    fn blank(&mut self) {
        self.rows.push(Row::new(RowKind::Blank));
    }

    fn notes(&mut self, notes: &[String]) {
        for note in notes {
            let mut row = Row::new(RowKind::Detail);
            row.two = format!("{DETAIL_INDENT}<{note}>");
            self.rows.push(row);
        }
    }

    fn option(&mut self, name: &str) {
        let Some(option) = self.registry.option(name) else {
            self.rows.push(Row {
                kind: RowKind::Option,
                one: format!("{OPTION_INDENT}--{name}"),
                short: String::new(),
                two: format!("{DESCRIPTION_LEAD}<undefined>"),
            });
            return;
        };

        let placeholder = option
            .placeholder
            .as_deref()
            .map(|p| format!(" <{p}>"))
            .unwrap_or_default();
        let mut description = format!("{DESCRIPTION_LEAD}{} ({}", option.description, option.kind);
        if let Some(default) = option.default.as_ref().filter(|v| !is_falsy(v)) {
            description.push_str(", default: ");
            description.push_str(&value_text(default));
        }
        description.push(')');

        self.rows.push(Row {
            kind: RowKind::Option,
            one: format!("{OPTION_INDENT}--{}{placeholder}", option.name),
            short: option.short.map(|s| format!(" -{s}")).unwrap_or_default(),
            two: description,
        });

        if !option.enum_values.is_empty() {
            let values: Vec<String> = option.enum_values.iter().map(enum_text).collect();
            let mut row = Row::new(RowKind::Detail);
            row.two = format!("{DETAIL_INDENT}{}", values.join(","));
            self.rows.push(row);
        }
        self.notes(&option.note);
    }

    fn command(&mut self, command: &CommandDef, group_options: &[String]) {
        let mut usage = format!("{COMMAND_INDENT}{}", command.name);
        if !command.variadic.is_empty() {
            usage.push_str(&format!(" <{}>", command.variadic.join(", ")));
        }
        self.rows.push(Row {
            kind: RowKind::Command,
            one: usage,
            short: String::new(),
            two: command.label.clone(),
        });
        self.notes(&command.note);

        for name in sorted_names(self.registry, &command.options) {
            if !self.command_bound.contains(&name) && !group_options.contains(&name) {
                self.option(&name);
            }
        }
    }

    fn build(mut self) -> Vec<Row> {
        let registry = self.registry;
        let mut leftover: Vec<&CommandDef> = registry.commands().iter().collect();

        let mut groups: Vec<_> = registry.groups().iter().collect();
        groups.sort_by(|a, b| sort::group_order(a, b));
        for group in groups {
            self.header(&group.label);

            let mut members: Vec<&CommandDef> = registry
                .commands()
                .iter()
                .filter(|command| command.in_group(&group.name))
                .collect();
            members.sort_by(|a, b| (group.sorter)(a, b));
            for command in members {
                self.command(command, &group.options);
                leftover.retain(|c| c.name != command.name);
            }

            if !group.options.is_empty() {
                self.divider();
                for name in sorted_names(registry, &group.options) {
                    if !self.command_bound.contains(&name) {
                        self.option(&name);
                    }
                }
            }
            self.blank();
        }

        if !leftover.is_empty() {
            self.header("other commands");
            for command in leftover {
                self.command(command, &[]);
            }
            self.blank();
        }

        let globals: Vec<String> = sorted_options(registry.options())
            .into_iter()
            .filter(|option| option.global && option.command.is_none())
            .map(|option| option.name.clone())
            .collect();
        if !self.command_bound.is_empty() || !globals.is_empty() {
            self.header("global options");
            let bound = self.command_bound.clone();
            for name in bound.iter().chain(&globals) {
                self.option(name);
            }
            self.blank();
        }

        self.rows
    }
}

/// Renders the help listing for `registry`.
pub fn render(registry: &Registry, theme: &Theme, use_color: bool) -> Result<String> {
    let rows = HelpTable::new(registry).build();
    let title = Some(registry.title().to_string()).filter(|t| !t.is_empty());
    let data = HelpData {
        title,
        rows: layout(rows),
    };
    let output = render_template(HELP_TEMPLATE, &data, theme, use_color)?;
    let lines: Vec<&str> = output.lines().map(str::trim_end).collect();
    Ok(lines.join("\n").trim_end().to_string())
}

fn layout(rows: Vec<Row>) -> Vec<RowData> {
    let one_width = rows.iter().map(|r| r.one.width()).max().unwrap_or(0);
    let short_width = rows.iter().map(|r| r.short.width()).max().unwrap_or(0);
    let has_short = short_width > 0;
    let has_two = rows.iter().any(|r| !r.two.is_empty());

    rows.into_iter()
        .map(|row| {
            let (one_style, two_style) = row.kind.styles();
            let mut one_gap = " ".repeat(one_width - row.one.width());
            if has_short || has_two {
                one_gap.push_str(COLUMN_GAP);
            }
            let mut short_gap = String::new();
            if has_short {
                short_gap = " ".repeat(short_width - row.short.width());
                if has_two {
                    short_gap.push_str(COLUMN_GAP);
                }
            }
            RowData {
                one: row.one,
                one_style,
                one_gap,
                short: row.short,
                short_gap,
                two: row.two,
                two_style,
            }
        })
        .collect()
}

fn sorted_options(options: &[OptionDef]) -> Vec<&OptionDef> {
    let mut options: Vec<&OptionDef> = options.iter().collect();
    options.sort_by(|a, b| sort::option_order(a, b));
    options
}

/// Option names in help order; undeclared names go last.
fn sorted_names(registry: &Registry, names: &[String]) -> Vec<String> {
    let mut names = names.to_vec();
    names.sort_by(|a, b| match (registry.option(a), registry.option(b)) {
        (Some(a), Some(b)) => sort::option_order(a, b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
    names
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(value_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

fn is_identifier(text: &str) -> bool {
    text.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn enum_text(value: &Value) -> String {
    if value.is_number() {
        return value.to_string();
    }
    let text = value_text(value);
    if is_identifier(&text) {
        text
    } else {
        quote(&text)
    }
}

/// Single-quoted literal with backslash escapes; non-ASCII becomes `\xNN` or `\uNNNN`.
fn quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\'' => quoted.push_str("\\'"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            ' '..='~' => quoted.push(c),
            c if (c as u32) < 0x100 => quoted.push_str(&format!("\\x{:02X}", c as u32)),
            c => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    quoted.push_str(&format!("\\u{:04X}", unit));
                }
            }
        }
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::OptionType;
    use crate::output::DEFAULT_THEME;
    use futures::FutureExt;
    use serde_json::json;

    fn command(registry: &mut Registry, name: &str, label: &str, groups: &[&str], options: &[&str]) {
        let groups: Vec<String> = groups.iter().map(|s| s.to_string()).collect();
        let options: Vec<String> = options.iter().map(|s| s.to_string()).collect();
        registry
            .define_command(|cmd| {
                cmd.name = name.into();
                cmd.label = label.into();
                cmd.groups = groups;
                cmd.options = options;
                cmd.on_execute(|_ctx| async { Ok(()) }.boxed());
            })
            .unwrap();
    }

    fn registry() -> Registry {
        let mut registry = Registry::new("demo tool");
        registry
            .define_option(|opt| {
                opt.name = "help".into();
                opt.short = Some('h');
                opt.description = "display usage help".into();
                opt.kind = OptionType::Flag;
                opt.command = Some("help".into());
                opt.global = true;
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "verbose".into();
                opt.description = "chatty output".into();
                opt.kind = OptionType::Flag;
                opt.global = true;
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "limit".into();
                opt.description = "max results".into();
                opt.kind = OptionType::Int;
                opt.placeholder = Some("n".into());
                opt.default = Some(json!(10));
                opt.note = vec!["zero means no limit".into()];
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "mode".into();
                opt.description = "fetch mode".into();
                opt.enum_values = vec![json!("fast"), json!(2), json!("very slow")];
            })
            .unwrap();
        registry
            .define_group(|g| {
                g.name = "main".into();
                g.label = "Main commands".into();
                g.options = vec!["mode".into()];
            })
            .unwrap();
        command(&mut registry, "query", "search things", &["main"], &["limit", "mode", "help"]);
        command(&mut registry, "lonely", "in no group", &[], &[]);
        registry.validate().unwrap();
        registry
    }

    fn plain(registry: &Registry) -> String {
        render(registry, &DEFAULT_THEME, false).unwrap()
    }

    #[test]
    fn sections_appear_in_order() {
        let text = plain(&registry());
        let title = text.find("demo tool").unwrap();
        let main = text.find("Main commands").unwrap();
        let other = text.find("other commands").unwrap();
        let global = text.find("global options").unwrap();
        assert!(title < main && main < other && other < global);
        assert!(text.starts_with("demo tool\n"));
    }

    #[test]
    fn command_lists_only_its_own_options() {
        let text = plain(&registry());
        let lines: Vec<&str> = text.lines().collect();
        let query = lines.iter().position(|l| l.contains("query")).unwrap();
        assert!(lines[query + 1].contains("--limit <n>"));
        assert!(lines[query + 1].contains(": max results (int, default: 10)"));
        assert!(lines[query + 2].contains("<zero means no limit>"));
        // --mode is a group option, --help is command-bound
        assert_eq!(text.matches("--mode").count(), 1);
        assert_eq!(text.matches("--help").count(), 1);
    }

    #[test]
    fn falsy_default_is_omitted() {
        let text = plain(&registry());
        assert!(text.contains(": chatty output (flag)"));
        assert!(text.contains(": display usage help (flag)"));
    }

    #[test]
    fn enum_values_quote_non_identifiers() {
        let text = plain(&registry());
        assert!(text.contains("fast,2,'very slow'"));
    }

    #[test]
    fn columns_align_and_lines_are_trimmed() {
        let text = plain(&registry());
        let help = text.lines().find(|l| l.contains("--help")).unwrap();
        let verbose = text.lines().find(|l| l.contains("--verbose")).unwrap();
        assert_eq!(help.find(':'), verbose.find(':'));
        assert!(help.contains(" -h"));
        assert!(text.lines().all(|l| l == l.trim_end()));
        assert!(!text.ends_with('\n'));
    }

    #[test]
    fn global_section_lists_command_bound_first() {
        let text = plain(&registry());
        let help = text.find("--help").unwrap();
        let verbose = text.find("--verbose").unwrap();
        assert!(help < verbose);
    }

    #[test]
    fn colored_output_carries_ansi() {
        let text = render(&registry(), &DEFAULT_THEME, true).unwrap();
        assert!(text.contains("\u{1b}["));
    }

    #[test]
    fn quoting_escapes() {
        assert_eq!(quote("it's"), r"'it\'s'");
        assert_eq!(quote("a\\b"), r"'a\\b'");
        assert_eq!(quote("tab\there"), r"'tab\there'");
        assert_eq!(quote("café"), r"'caf\xE9'");
        assert_eq!(quote("☃"), r"'\u2603'");
        assert_eq!(quote("😀"), r"'\uD83D\uDE00'");
    }

    #[test]
    fn identifiers_stay_bare() {
        assert_eq!(enum_text(&json!("semver-range_2")), "semver-range_2");
        assert_eq!(enum_text(&json!(1.5)), "1.5");
        assert_eq!(enum_text(&json!(true)), "true");
        assert_eq!(enum_text(&json!("a.b")), "'a.b'");
    }

    #[test]
    fn empty_registry_renders_nothing() {
        let registry = Registry::default();
        assert_eq!(plain(&registry), "");
    }
}
