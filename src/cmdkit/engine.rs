//! # Execution Engine
//!
//! A [`ProgramBuilder`] collects definitions and hooks; [`ProgramBuilder::build`] validates and
//! freezes the registry into a [`Program`]. One invocation moves through:
//!
//! ```text
//! RAW --tokenize--> PARSED --effects--> RESOLVED --> BEFORE --> EXECUTING --> AFTER --> DONE
//!  |                  |                                 |           |            |
//!  +------------------+---------------------------------+-----------+------------+--> FAILED
//! ```
//!
//! Resolution picks the command in this order:
//!
//! 1. the first declared option bound to a command (`--help`, `--version`) that is present
//! 2. after dropping `argv_padding` leading positionals, the next positional if it names a
//!    command; an unknown name prints `command not found: <name>` and runs `help`
//! 3. with no positional left, the fallback command (`alt`, then `default_command`, then `help`)
//!
//! The outcome is always an [`ExecutionResult`]; nothing in the engine panics or exits except
//! [`Program::exit`].

use crate::args::{ArgBag, ClapTokenizer, Tokenizer};
use crate::coerce::OptionType;
use crate::config::ProgramConfig;
use crate::context::ExecutionContext;
use crate::error::{Error, Result};
use crate::help;
use crate::output::{StyledOut, Theme};
use crate::registry::{CommandDef, GroupDef, Hook, OptionDef, Registry};
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

pub const HELP_COMMAND: &str = "help";

/// Outcome of one invocation.
#[derive(Debug)]
pub struct ExecutionResult {
    /// 0 on success, otherwise the error's declared positive code or 1.
    pub code: i32,
    pub context: ExecutionContext,
    pub error: Option<Error>,
}

impl ExecutionResult {
    fn success(context: ExecutionContext) -> Self {
        Self {
            code: 0,
            context,
            error: None,
        }
    }

    fn failure(error: Error, context: ExecutionContext) -> Self {
        let code = error.code().filter(|code| *code > 0).unwrap_or(1);
        Self {
            code,
            context,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub struct ProgramBuilder {
    registry: Registry,
    config: ProgramConfig,
    before: Option<Hook>,
    after: Option<Hook>,
    tokenizer: Arc<dyn Tokenizer>,
    out: Option<StyledOut>,
    theme: Option<Theme>,
    setup: Option<Error>,
}

impl ProgramBuilder {
    /// A builder whose registry already holds the built-in `help` command and `--help/-h`
    /// flag. Defining either name again replaces the built-in in place.
    pub fn new(config: ProgramConfig) -> Self {
        let mut registry = Registry::new(config.title.clone().unwrap_or_default());
        let setup = define_help(&mut registry).err();
        Self {
            registry,
            config,
            before: None,
            after: None,
            tokenizer: Arc::new(ClapTokenizer),
            out: None,
            theme: None,
            setup,
        }
    }

    pub fn define_option<F: FnOnce(&mut OptionDef)>(&mut self, build: F) -> Result<&mut Self> {
        self.registry.define_option(build)?;
        Ok(self)
    }

    pub fn define_command<F: FnOnce(&mut CommandDef)>(&mut self, build: F) -> Result<&mut Self> {
        self.registry.define_command(build)?;
        Ok(self)
    }

    pub fn define_group<F: FnOnce(&mut GroupDef)>(&mut self, build: F) -> Result<&mut Self> {
        self.registry.define_group(build)?;
        Ok(self)
    }

    /// Hook awaited before every command body.
    pub fn before<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.before = Some(Arc::new(f));
        self
    }

    /// Hook awaited after every successful command body.
    pub fn after<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, Result<()>>
            + Send
            + Sync
            + 'static,
    {
        self.after = Some(Arc::new(f));
        self
    }

    pub fn tokenizer(&mut self, tokenizer: impl Tokenizer + 'static) -> &mut Self {
        self.tokenizer = Arc::new(tokenizer);
        self
    }

    /// Sends all output, errors included, to `out`.
    pub fn output(&mut self, out: StyledOut) -> &mut Self {
        self.out = Some(out);
        self
    }

    /// Styles used by every writer of the program, help included.
    pub fn theme(&mut self, theme: Theme) -> &mut Self {
        self.theme = Some(theme);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Validates and freezes the registry.
    pub fn build(mut self) -> Result<Program> {
        if let Some(err) = self.setup.take() {
            return Err(err);
        }
        self.registry.validate()?;

        let use_color = self.config.color.resolve();
        let (mut out, mut err_out) = match self.out {
            Some(out) => (out.clone(), out),
            None => (StyledOut::stdout(use_color), StyledOut::stderr(use_color)),
        };
        if let Some(theme) = self.theme {
            out = out.with_theme(theme.clone());
            err_out = err_out.with_theme(theme);
        }
        debug!(
            options = self.registry.options().len(),
            commands = self.registry.commands().len(),
            groups = self.registry.groups().len(),
            "registry frozen"
        );
        Ok(Program {
            registry: Arc::new(self.registry),
            config: Arc::new(self.config),
            before: self.before,
            after: self.after,
            tokenizer: self.tokenizer,
            out,
            err_out,
        })
    }
}

fn define_help(registry: &mut Registry) -> Result<()> {
    registry.define_builtin_command(|cmd| {
        cmd.name = HELP_COMMAND.into();
        cmd.label = "usage help".into();
        cmd.groups = vec![HELP_COMMAND.into()];
        cmd.on_execute(|ctx| {
            async move {
                let out = ctx.out();
                let text = help::render(ctx.registry(), out.theme(), out.use_color())?;
                out.block(&text)
            }
            .boxed()
        });
    })?;
    registry.define_builtin_option(|opt| {
        opt.name = HELP_COMMAND.into();
        opt.short = Some('h');
        opt.description = "display usage help".into();
        opt.kind = OptionType::Flag;
        opt.command = Some(HELP_COMMAND.into());
        opt.global = true;
    })
}

/// A frozen program. Cheap to clone; invocations share only the registry and config.
#[derive(Clone)]
pub struct Program {
    registry: Arc<Registry>,
    config: Arc<ProgramConfig>,
    before: Option<Hook>,
    after: Option<Hook>,
    tokenizer: Arc<dyn Tokenizer>,
    out: StyledOut,
    err_out: StyledOut,
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("before", &self.before.is_some())
            .field("after", &self.after.is_some())
            .finish_non_exhaustive()
    }
}

impl Program {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn config(&self) -> &ProgramConfig {
        &self.config
    }

    /// A fresh context over `bag`, writing to this program's output.
    pub fn context(&self, bag: ArgBag) -> ExecutionContext {
        ExecutionContext::new(self.registry.clone(), bag, self.out.clone())
    }

    /// Parses `argv`, resolves a command and runs it.
    pub async fn execute_raw(&self, argv: &[String], alt: Option<&str>) -> ExecutionResult {
        let fallback = self.fallback(alt);

        let bag = match self.tokenizer.tokenize(&self.registry, argv) {
            Ok(bag) => bag,
            Err(err) => {
                debug!(error = %err, "tokenizer rejected argv");
                return ExecutionResult::failure(err, self.context(ArgBag::default()));
            }
        };
        let mut ctx = self.context(bag);

        if let Err(err) = self.apply_effects(&mut ctx) {
            return ExecutionResult::failure(err, ctx);
        }

        let bound = self
            .registry
            .options()
            .iter()
            .find(|option| option.command.is_some() && ctx.has_declared_opt(&option.name))
            .and_then(|option| option.command.clone());
        if let Some(command) = bound {
            debug!(%command, "resolved through command option");
            return self.execute_command(&command, ctx).await;
        }

        for _ in 0..self.config.argv_padding {
            ctx.shift_arg();
        }
        let Some(name) = ctx.shift_arg() else {
            debug!(command = %fallback, "no command given, using fallback");
            return self.execute_command(&fallback, ctx).await;
        };
        if self.registry.has_command(&name) {
            debug!(command = %name, "resolved from argv");
            return self.execute_command(&name, ctx).await;
        }

        warn!(command = %name, "command not found");
        if let Err(err) = ctx.out().warning(&format!("command not found: {name}")) {
            return ExecutionResult::failure(err, ctx);
        }
        self.execute_command(HELP_COMMAND, ctx).await
    }

    /// Runs `name` with the before/after hooks around it.
    pub async fn execute_command(&self, name: &str, mut ctx: ExecutionContext) -> ExecutionResult {
        let Some(execute) = self
            .registry
            .command(name)
            .and_then(|command| command.execute_hook().cloned())
        else {
            return ExecutionResult::failure(Error::UnknownCommand(name.to_string()), ctx);
        };
        ctx.set_command(name);

        match self.run_phases(&execute, &mut ctx).await {
            Ok(()) => {
                debug!(command = name, "command finished");
                ExecutionResult::success(ctx)
            }
            Err(err) => {
                debug!(command = name, error = %err, "command failed");
                ExecutionResult::failure(err, ctx)
            }
        }
    }

    /// Executes, reports any error and returns the process exit code, exiting when asked.
    pub async fn execute_argv(&self, argv: &[String], alt: Option<&str>, exit_after: bool) -> i32 {
        let result = self.execute_raw(argv, alt).await;
        let code = match &result.error {
            Some(err) => {
                self.report(err);
                1
            }
            None => result.code,
        };
        if exit_after {
            self.exit(code);
        }
        code
    }

    /// Terminates the process, announcing non-zero codes.
    pub fn exit(&self, code: i32) -> ! {
        if code != 0 {
            let _ = self
                .err_out
                .line("")
                .and_then(|()| self.err_out.error(&format!("Closing with exit code {code}")));
        }
        std::process::exit(code)
    }

    fn fallback(&self, alt: Option<&str>) -> String {
        [alt, self.config.default_command.as_deref()]
            .into_iter()
            .flatten()
            .find(|name| self.registry.has_command(name))
            .unwrap_or(HELP_COMMAND)
            .to_string()
    }

    /// Collects `(apply, value)` for every present option with a side effect, then runs them.
    fn apply_effects(&self, ctx: &mut ExecutionContext) -> Result<()> {
        let mut effects = Vec::new();
        for option in self.registry.options() {
            let Some(apply) = option.apply_fn() else {
                continue;
            };
            if ctx.has_opt(&option.name) {
                let value = ctx.get_opt(&option.name)?.unwrap_or(Value::Null);
                effects.push((option.name.as_str(), apply.clone(), value));
            }
        }
        for (name, apply, value) in effects {
            trace!(option = name, %value, "applying option");
            apply(&value, ctx)?;
        }
        Ok(())
    }

    async fn run_phases(&self, execute: &Hook, ctx: &mut ExecutionContext) -> Result<()> {
        if let Some(before) = &self.before {
            trace!("before hook");
            before(ctx).await?;
        }
        execute(ctx).await?;
        if let Some(after) = &self.after {
            trace!("after hook");
            after(ctx).await?;
        }
        Ok(())
    }

    fn report(&self, err: &Error) {
        let message = if self.config.trace_errors {
            let mut chain = err.to_string();
            let mut source = std::error::Error::source(err);
            while let Some(cause) = source {
                chain.push_str(&format!("\n  caused by: {cause}"));
                source = cause.source();
            }
            chain
        } else {
            err.to_string()
        };
        let _ = self.err_out.error(&message);
    }
}
