//! # Registries
//!
//! Options, commands and groups are declared through builder callbacks: the callback receives a
//! fresh record, fills in its fields and hands it back to the [`Registry`], which checks the name
//! and stores it in definition order.
//!
//! Every record gets a registration index from a single counter shared by all three kinds, so
//! "defined earlier" is comparable across kinds. The help renderer and the default command
//! ordering rely on it.
//!
//! A registry is mutable only until [`Registry::validate`] succeeds. Validation checks that every
//! option name referenced by a group or a command has been declared; afterwards the registry is
//! frozen and further definitions fail with [`Error::Frozen`].
//!
//! Built-in records (the engine's `help` command and flag) are registered first and stay
//! replaceable: a later definition with the same name takes over their slot and index.

use crate::coerce::OptionType;
use crate::context::ExecutionContext;
use crate::error::{DefinitionKind, Error, Result};
use crate::sort;
use futures::future::BoxFuture;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// An async step run against an invocation context: the global before/after hooks and every
/// command body share this shape.
pub type Hook =
    Arc<dyn for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<()>> + Send + Sync>;

/// Side effect of an option, run with its coerced value before any command logic.
pub type ApplyFn = Arc<dyn Fn(&Value, &mut ExecutionContext) -> Result<()> + Send + Sync>;

/// Comparator ordering the member commands of a group.
pub type CommandSorter = Arc<dyn Fn(&CommandDef, &CommandDef) -> Ordering + Send + Sync>;

/// Wraps a closure as a [`Hook`].
///
/// ```rust
/// use cmdkit::registry::hook;
/// use futures::FutureExt;
///
/// let before = hook(|ctx| async move {
///     ctx.out().muted("starting")?;
///     Ok(())
/// }.boxed());
/// ```
pub fn hook<F>(f: F) -> Hook
where
    F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone, Default)]
pub struct OptionDef {
    pub name: String,
    pub description: String,
    pub short: Option<char>,
    pub kind: OptionType,
    pub placeholder: Option<String>,
    pub default: Option<Value>,
    /// Name of the command this option runs when present (e.g. `--help`, `--version`).
    pub command: Option<String>,
    pub global: bool,
    pub enum_values: Vec<Value>,
    pub note: Vec<String>,
    pub example: Vec<String>,
    index: usize,
    apply: Option<ApplyFn>,
}

impl OptionDef {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn on_apply<F>(&mut self, f: F)
    where
        F: Fn(&Value, &mut ExecutionContext) -> Result<()> + Send + Sync + 'static,
    {
        self.apply = Some(Arc::new(f));
    }

    pub fn apply_fn(&self) -> Option<&ApplyFn> {
        self.apply.as_ref()
    }
}

impl fmt::Debug for OptionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionDef")
            .field("name", &self.name)
            .field("short", &self.short)
            .field("kind", &self.kind)
            .field("default", &self.default)
            .field("command", &self.command)
            .field("global", &self.global)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Default)]
pub struct CommandDef {
    pub name: String,
    pub label: String,
    pub options: Vec<String>,
    pub variadic: Vec<String>,
    pub groups: Vec<String>,
    pub note: Vec<String>,
    index: usize,
    execute: Option<Hook>,
}

impl CommandDef {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn on_execute<F>(&mut self, f: F)
    where
        F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.execute = Some(Arc::new(f));
    }

    pub fn execute_hook(&self) -> Option<&Hook> {
        self.execute.as_ref()
    }

    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

impl fmt::Debug for CommandDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDef")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("options", &self.options)
            .field("groups", &self.groups)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
pub struct GroupDef {
    pub name: String,
    pub label: String,
    pub options: Vec<String>,
    /// Orders the member commands in the help listing.
    pub sorter: CommandSorter,
    index: usize,
}

impl Default for GroupDef {
    fn default() -> Self {
        Self {
            name: String::new(),
            label: String::new(),
            options: Vec::new(),
            sorter: Arc::new(sort::by_index),
            index: 0,
        }
    }
}

impl GroupDef {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn set_sorter<F>(&mut self, f: F)
    where
        F: Fn(&CommandDef, &CommandDef) -> Ordering + Send + Sync + 'static,
    {
        self.sorter = Arc::new(f);
    }
}

impl fmt::Debug for GroupDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupDef")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("options", &self.options)
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct Registry {
    title: String,
    options: Vec<OptionDef>,
    commands: Vec<CommandDef>,
    groups: Vec<GroupDef>,
    option_slots: HashMap<String, usize>,
    command_slots: HashMap<String, usize>,
    group_slots: HashMap<String, usize>,
    builtins: HashSet<(DefinitionKind, String)>,
    last_index: usize,
    validated: bool,
}

impl Registry {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn define_option<F: FnOnce(&mut OptionDef)>(&mut self, build: F) -> Result<()> {
        let mut option = OptionDef::default();
        build(&mut option);

        if option.kind == OptionType::Flag && option.default.is_none() {
            option.default = Some(Value::Bool(false));
        }
        self.ensure_named(DefinitionKind::Option, &option.name)?;
        if let Some(short) = option.short {
            if let Some(owner) = self
                .options
                .iter()
                .find(|o| o.short == Some(short) && o.name != option.name)
            {
                return Err(Error::DuplicateShort {
                    short,
                    name: option.name,
                    owner: owner.name.clone(),
                });
            }
        }

        match self.claim(DefinitionKind::Option, &option.name)? {
            Some(slot) => {
                option.index = self.options[slot].index;
                self.options[slot] = option;
            }
            None => {
                option.index = self.next_index();
                self.option_slots
                    .insert(option.name.clone(), self.options.len());
                self.options.push(option);
            }
        }
        Ok(())
    }

    pub fn define_command<F: FnOnce(&mut CommandDef)>(&mut self, build: F) -> Result<()> {
        let mut command = CommandDef::default();
        build(&mut command);

        if command.execute.is_none() {
            self.ensure_named(DefinitionKind::Command, &command.name)?;
            return Err(Error::MissingExecute(command.name));
        }

        match self.claim(DefinitionKind::Command, &command.name)? {
            Some(slot) => {
                command.index = self.commands[slot].index;
                self.commands[slot] = command;
            }
            None => {
                command.index = self.next_index();
                self.command_slots
                    .insert(command.name.clone(), self.commands.len());
                self.commands.push(command);
            }
        }
        Ok(())
    }

    /// Defines an option that a later definition of the same name replaces in place.
    pub fn define_builtin_option<F: FnOnce(&mut OptionDef)>(&mut self, build: F) -> Result<()> {
        let mut name = String::new();
        self.define_option(|option| {
            build(option);
            name = option.name.clone();
        })?;
        self.builtins.insert((DefinitionKind::Option, name));
        Ok(())
    }

    /// Defines a command that a later definition of the same name replaces in place.
    pub fn define_builtin_command<F: FnOnce(&mut CommandDef)>(&mut self, build: F) -> Result<()> {
        let mut name = String::new();
        self.define_command(|command| {
            build(command);
            name = command.name.clone();
        })?;
        self.builtins.insert((DefinitionKind::Command, name));
        Ok(())
    }

    pub fn is_builtin(&self, kind: DefinitionKind, name: &str) -> bool {
        self.builtins.contains(&(kind, name.to_string()))
    }

    pub fn define_group<F: FnOnce(&mut GroupDef)>(&mut self, build: F) -> Result<()> {
        let mut group = GroupDef::default();
        build(&mut group);

        match self.claim(DefinitionKind::Group, &group.name)? {
            Some(slot) => {
                group.index = self.groups[slot].index;
                self.groups[slot] = group;
            }
            None => {
                group.index = self.next_index();
                self.group_slots.insert(group.name.clone(), self.groups.len());
                self.groups.push(group);
            }
        }
        Ok(())
    }

    /// Checks every option reference made by groups and commands.
    ///
    /// Runs its checks once; after the first success the registry is frozen and later calls
    /// return `Ok(())` immediately.
    pub fn validate(&mut self) -> Result<()> {
        if self.validated {
            return Ok(());
        }
        for group in &self.groups {
            self.ensure_declared(&group.options, || format!("group {}", group.name))?;
        }
        for command in &self.commands {
            self.ensure_declared(&command.options, || format!("command {}", command.name))?;
        }
        self.validated = true;
        Ok(())
    }

    pub fn is_validated(&self) -> bool {
        self.validated
    }

    pub fn option(&self, name: &str) -> Option<&OptionDef> {
        self.option_slots.get(name).map(|&i| &self.options[i])
    }

    pub fn command(&self, name: &str) -> Option<&CommandDef> {
        self.command_slots.get(name).map(|&i| &self.commands[i])
    }

    pub fn group(&self, name: &str) -> Option<&GroupDef> {
        self.group_slots.get(name).map(|&i| &self.groups[i])
    }

    pub fn has_option(&self, name: &str) -> bool {
        self.option_slots.contains_key(name)
    }

    pub fn has_command(&self, name: &str) -> bool {
        self.command_slots.contains_key(name)
    }

    pub fn has_group(&self, name: &str) -> bool {
        self.group_slots.contains_key(name)
    }

    /// Options in definition order.
    pub fn options(&self) -> &[OptionDef] {
        &self.options
    }

    /// Commands in definition order.
    pub fn commands(&self) -> &[CommandDef] {
        &self.commands
    }

    /// Groups in definition order.
    pub fn groups(&self) -> &[GroupDef] {
        &self.groups
    }

    fn next_index(&mut self) -> usize {
        self.last_index += 1;
        self.last_index
    }

    fn ensure_named(&self, kind: DefinitionKind, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::MissingName { kind });
        }
        if self.validated {
            return Err(Error::Frozen {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Checks that `name` can be defined. Returns the slot of a built-in record it replaces.
    fn claim(&mut self, kind: DefinitionKind, name: &str) -> Result<Option<usize>> {
        self.ensure_named(kind, name)?;
        let slot = match kind {
            DefinitionKind::Option => self.option_slots.get(name),
            DefinitionKind::Command => self.command_slots.get(name),
            DefinitionKind::Group => self.group_slots.get(name),
        };
        let Some(&slot) = slot else {
            return Ok(None);
        };
        if self.builtins.remove(&(kind, name.to_string())) {
            return Ok(Some(slot));
        }
        Err(Error::DuplicateName {
            kind,
            name: name.to_string(),
        })
    }

    fn ensure_declared(&self, names: &[String], referrer: impl Fn() -> String) -> Result<()> {
        match names.iter().find(|name| !self.has_option(name)) {
            Some(missing) => Err(Error::UndefinedOption {
                name: missing.clone(),
                referrer: referrer(),
            }),
            None => Ok(()),
        }
    }
}
