use crate::args::{ArgBag, RawValue};
use crate::coerce::OptionType;
use crate::error::{Error, Result};
use crate::output::StyledOut;
use crate::registry::Registry;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// State of one invocation: the tokenized command line plus the resolved command.
///
/// Positionals are consumed from the front as the engine and commands shift them. Option values
/// stay raw until read, so a bad value only fails the code path that asks for it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    registry: Arc<Registry>,
    out: StyledOut,
    command: Option<String>,
    positional: VecDeque<String>,
    named: HashMap<String, RawValue>,
}

impl ExecutionContext {
    pub fn new(registry: Arc<Registry>, bag: ArgBag, out: StyledOut) -> Self {
        Self {
            registry,
            out,
            command: None,
            positional: bag.positional.into(),
            named: bag.named,
        }
    }

    /// A context with no arguments.
    pub fn empty(registry: Arc<Registry>, out: StyledOut) -> Self {
        Self::new(registry, ArgBag::default(), out)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Name of the command being executed, once resolved.
    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub(crate) fn set_command(&mut self, name: &str) {
        self.command = Some(name.to_string());
    }

    pub fn out(&self) -> &StyledOut {
        &self.out
    }

    pub fn out_mut(&mut self) -> &mut StyledOut {
        &mut self.out
    }

    pub fn has_opt(&self, name: &str) -> bool {
        self.named.contains_key(name)
    }

    /// Present on the command line and declared in the registry.
    pub fn has_declared_opt(&self, name: &str) -> bool {
        self.has_opt(name) && self.registry.has_option(name)
    }

    pub fn get_opt_raw(&self, name: &str) -> Option<&RawValue> {
        self.named.get(name)
    }

    /// Names present on the command line, sorted. `strict` keeps declared options only.
    pub fn opt_names(&self, strict: bool) -> Vec<String> {
        let mut names: Vec<String> = self
            .named
            .keys()
            .filter(|name| !strict || self.registry.has_option(name))
            .cloned()
            .collect();
        names.sort();
        names
    }

    pub fn get_default(&self, name: &str) -> Option<Value> {
        self.registry
            .option(name)
            .and_then(|option| option.default.clone())
    }

    /// Whether the resolved value equals the declared default (absent options included).
    pub fn is_default(&self, name: &str) -> Result<bool> {
        Ok(self.get_opt(name)? == self.get_default(name))
    }

    /// Resolved value of an option.
    ///
    /// Absent options resolve to their declared default (or `None`). Present declared options
    /// are coerced per their type; a bare occurrence of an option that expects a value is
    /// treated as absent. Undeclared options resolve to their raw value.
    pub fn get_opt(&self, name: &str) -> Result<Option<Value>> {
        let Some(raw) = self.named.get(name) else {
            return Ok(self.get_default(name));
        };
        let Some(option) = self.registry.option(name) else {
            return Ok(Some(match raw {
                RawValue::Str(s) => Value::String(s.clone()),
                RawValue::Bool(b) => Value::Bool(*b),
            }));
        };
        match raw {
            RawValue::Bool(_) if !option.kind.accepts_bare() => Ok(option.default.clone()),
            RawValue::Bool(b) => Ok(Some(Value::Bool(*b))),
            RawValue::Str(s) => option
                .kind
                .coerce(s)
                .map(Some)
                .map_err(|source| Error::InvalidValue {
                    target: format!("option --{name}"),
                    source,
                }),
        }
    }

    /// Coerces the option's raw value with an explicit type instead of the declared one.
    pub fn get_opt_as(&self, name: &str, kind: &OptionType) -> Result<Option<Value>> {
        match self.named.get(name) {
            None => Ok(self.get_default(name)),
            Some(raw) => kind
                .coerce(&raw.as_text())
                .map(Some)
                .map_err(|source| Error::InvalidValue {
                    target: format!("option --{name}"),
                    source,
                }),
        }
    }

    /// The resolved value only if it is one of the option's enum values.
    pub fn get_opt_enum(&self, name: &str) -> Result<Option<Value>> {
        let Some(option) = self.registry.option(name) else {
            return Ok(None);
        };
        Ok(self
            .get_opt(name)?
            .filter(|value| option.enum_values.contains(value)))
    }

    pub fn get_flag(&self, name: &str) -> Result<bool> {
        Ok(matches!(self.get_opt(name)?, Some(Value::Bool(true))))
    }

    /// String view of a resolved value; non-string values are rendered as JSON.
    pub fn get_string(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get_opt(name)?.map(|value| match value {
            Value::String(s) => s,
            other => other.to_string(),
        }))
    }

    /// Deserializes a resolved value into `T`.
    pub fn get_typed<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.get_opt(name)?
            .map(|value| serde_json::from_value(value).map_err(Error::from))
            .transpose()
    }

    pub fn num_args(&self) -> usize {
        self.positional.len()
    }

    pub fn arg_at(&self, index: usize) -> Option<&str> {
        self.positional.get(index).map(String::as_str)
    }

    pub fn arg_at_as(&self, index: usize, kind: &OptionType) -> Result<Option<Value>> {
        self.arg_at(index)
            .map(|raw| coerce_arg(kind, raw, index))
            .transpose()
    }

    /// All remaining positionals coerced with `kind`.
    pub fn args_as(&self, kind: &OptionType) -> Result<Vec<Value>> {
        self.positional
            .iter()
            .enumerate()
            .map(|(index, raw)| coerce_arg(kind, raw, index))
            .collect()
    }

    /// Removes and returns the first positional.
    pub fn shift_arg(&mut self) -> Option<String> {
        self.positional.pop_front()
    }

    pub fn shift_arg_as(&mut self, kind: &OptionType) -> Result<Option<Value>> {
        self.shift_arg()
            .map(|raw| coerce_arg(kind, &raw, 0))
            .transpose()
    }

    /// Remaining positionals, front first.
    pub fn args(&self) -> impl Iterator<Item = &str> {
        self.positional.iter().map(String::as_str)
    }
}

fn coerce_arg(kind: &OptionType, raw: &str, index: usize) -> Result<Value> {
    kind.coerce(raw).map_err(|source| Error::InvalidValue {
        target: format!("argument #{index}"),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Arc<Registry> {
        let mut registry = Registry::default();
        registry
            .define_option(|opt| {
                opt.name = "limit".into();
                opt.kind = OptionType::Int;
                opt.default = Some(json!(10));
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "verbose".into();
                opt.kind = OptionType::Flag;
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "color".into();
                opt.kind = OptionType::Boolean;
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "mode".into();
                opt.enum_values = vec![json!("fast"), json!("slow")];
            })
            .unwrap();
        registry
            .define_option(|opt| {
                opt.name = "ids".into();
                opt.kind = OptionType::IntList;
            })
            .unwrap();
        Arc::new(registry)
    }

    fn context(bag: ArgBag) -> ExecutionContext {
        ExecutionContext::new(registry(), bag, StyledOut::buffered())
    }

    #[test]
    fn absent_option_resolves_to_default() {
        let ctx = context(ArgBag::new());
        assert_eq!(ctx.get_opt("limit").unwrap(), Some(json!(10)));
        assert_eq!(ctx.get_opt("verbose").unwrap(), Some(json!(false)));
        assert_eq!(ctx.get_opt("mode").unwrap(), None);
        assert!(ctx.is_default("limit").unwrap());
    }

    #[test]
    fn present_option_is_coerced() {
        let ctx = context(ArgBag::new().opt("limit", "5").opt("color", "off"));
        assert_eq!(ctx.get_opt("limit").unwrap(), Some(json!(5)));
        assert_eq!(ctx.get_opt("color").unwrap(), Some(json!(false)));
        assert!(!ctx.is_default("limit").unwrap());
    }

    #[test]
    fn bare_occurrence_of_value_option_falls_back_to_default() {
        let ctx = context(ArgBag::new().opt("limit", true));
        assert!(ctx.has_opt("limit"));
        assert_eq!(ctx.get_opt("limit").unwrap(), Some(json!(10)));
    }

    #[test]
    fn bare_flag_is_true() {
        let ctx = context(ArgBag::new().opt("verbose", true));
        assert!(ctx.get_flag("verbose").unwrap());
    }

    #[test]
    fn invalid_value_names_the_option() {
        let ctx = context(ArgBag::new().opt("ids", "1,x,3"));
        let err = ctx.get_opt("ids").unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref target, .. } if target == "option --ids"));
    }

    #[test]
    fn undeclared_option_returns_raw_value() {
        let ctx = context(ArgBag::new().opt("extra", "x").opt("loose", true));
        assert_eq!(ctx.get_opt("extra").unwrap(), Some(json!("x")));
        assert_eq!(ctx.get_opt("loose").unwrap(), Some(json!(true)));
        assert!(ctx.has_opt("extra"));
        assert!(!ctx.has_declared_opt("extra"));
        assert_eq!(ctx.opt_names(false), ["extra", "loose"]);
        assert!(ctx.opt_names(true).is_empty());
    }

    #[test]
    fn enum_filter() {
        let ctx = context(ArgBag::new().opt("mode", "fast"));
        assert_eq!(ctx.get_opt_enum("mode").unwrap(), Some(json!("fast")));
        let ctx = context(ArgBag::new().opt("mode", "medium"));
        assert_eq!(ctx.get_opt_enum("mode").unwrap(), None);
    }

    #[test]
    fn explicit_type_overrides_declared() {
        let ctx = context(ArgBag::new().opt("mode", "1,2"));
        assert_eq!(
            ctx.get_opt_as("mode", &OptionType::IntList).unwrap(),
            Some(json!([1, 2]))
        );
    }

    #[test]
    fn string_and_typed_views() {
        let ctx = context(ArgBag::new().opt("limit", "7").opt("mode", "slow"));
        assert_eq!(ctx.get_string("limit").unwrap().as_deref(), Some("7"));
        assert_eq!(ctx.get_string("mode").unwrap().as_deref(), Some("slow"));
        assert_eq!(ctx.get_typed::<u32>("limit").unwrap(), Some(7));
    }

    #[test]
    fn positional_access_and_shift() {
        let mut ctx = context(ArgBag::new().arg("query").arg("3").arg("4"));
        assert_eq!(ctx.num_args(), 3);
        assert_eq!(ctx.arg_at(0), Some("query"));
        assert_eq!(ctx.shift_arg().as_deref(), Some("query"));
        assert_eq!(ctx.args_as(&OptionType::Int).unwrap(), vec![json!(3), json!(4)]);
        assert_eq!(ctx.shift_arg_as(&OptionType::Int).unwrap(), Some(json!(3)));
        assert_eq!(ctx.arg_at_as(0, &OptionType::Number).unwrap(), Some(json!(4.0)));
        assert_eq!(ctx.num_args(), 1);
    }

    #[test]
    fn bad_positional_names_its_index() {
        let ctx = context(ArgBag::new().arg("1").arg("two"));
        let err = ctx.args_as(&OptionType::Int).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref target, .. } if target == "argument #1"));
    }

    #[test]
    fn shifting_past_the_end_is_none() {
        let mut ctx = context(ArgBag::new());
        assert_eq!(ctx.shift_arg(), None);
        assert_eq!(ctx.shift_arg_as(&OptionType::Int).unwrap(), None);
    }
}
