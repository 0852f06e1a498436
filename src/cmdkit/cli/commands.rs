use super::options::{group, names, DEFAULT_CONFIG};
use cmdkit::output::{names as style, StyledOut};
use cmdkit::{
    ActionMap, Error, ExecutionContext, Notifier, ProgramBuilder, ProgramConfig, PromiseStash,
    Result,
};
use futures::channel::mpsc::UnboundedReceiver;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Package {
    pub name: &'static str,
    pub version: &'static str,
    pub summary: &'static str,
}

const CATALOG: &[Package] = &[
    Package {
        name: "async/futures",
        version: "0.3.31",
        summary: "zero-cost asynchronous programming",
    },
    Package {
        name: "async/tokio",
        version: "1.41.0",
        summary: "event-driven non-blocking I/O platform",
    },
    Package {
        name: "cli/clap",
        version: "4.5.53",
        summary: "command line argument parser",
    },
    Package {
        name: "cli/console",
        version: "0.15.8",
        summary: "terminal and console abstraction",
    },
    Package {
        name: "encoding/serde",
        version: "1.0.228",
        summary: "serialization framework",
    },
    Package {
        name: "encoding/serde_json",
        version: "1.0.145",
        summary: "JSON support for serde",
    },
    Package {
        name: "text/minijinja",
        version: "2.5.0",
        summary: "template engine",
    },
    Package {
        name: "text/unicode-width",
        version: "0.2.2",
        summary: "display width of unicode text",
    },
];

/// Action run on a query selection: `(selection, overwrite, notifier)` to written paths.
pub type QueryAction = fn(Vec<Package>, bool, Notifier) -> BoxFuture<'static, Result<Vec<String>>>;

pub const INSTALL: &str = "install";

struct QueryState {
    lookups: PromiseStash<Vec<Package>>,
    actions: ActionMap<QueryAction>,
}

impl QueryState {
    fn new() -> Self {
        let mut actions: ActionMap<QueryAction> = ActionMap::new();
        actions.set(INSTALL, install);
        Self {
            lookups: PromiseStash::new(),
            actions,
        }
    }
}

fn install(
    selection: Vec<Package>,
    overwrite: bool,
    notifier: Notifier,
) -> BoxFuture<'static, Result<Vec<String>>> {
    async move {
        let mut written = Vec::with_capacity(selection.len());
        for package in selection {
            notifier.notify(json!({ "install": package.name, "overwrite": overwrite }));
            written.push(format!(
                "vendor/{}-{}",
                package.name.replace('/', "-"),
                package.version
            ));
        }
        Ok(written)
    }
    .boxed()
}

async fn lookup(pattern: String) -> Result<Vec<Package>> {
    let needle = pattern.to_lowercase();
    Ok(CATALOG
        .iter()
        .filter(|package| needle == "*" || package.name.to_lowercase().contains(&needle))
        .cloned()
        .collect())
}

/// Looks up every pattern once, keeping first-seen order. Repeated patterns share one lookup;
/// the stash is emptied again before returning.
async fn select(
    lookups: &PromiseStash<Vec<Package>>,
    patterns: &[String],
    notifier: &Notifier,
) -> Result<Vec<Package>> {
    let mut selection: Vec<Package> = Vec::new();
    let mut found = Ok(());
    for pattern in patterns {
        notifier.notify(json!({ "lookup": pattern }));
        match lookups.share(pattern, || lookup(pattern.clone())).await {
            Ok(packages) => {
                for package in packages {
                    if !selection.contains(&package) {
                        selection.push(package);
                    }
                }
            }
            Err(err) => {
                found = Err(Error::command(err.to_string()));
                break;
            }
        }
    }
    for pattern in patterns {
        lookups.remove(pattern);
    }
    found.map(|()| selection)
}

fn drain_notes(out: &StyledOut, notes: &mut Option<UnboundedReceiver<Value>>) -> Result<()> {
    if let Some(rx) = notes {
        while let Ok(note) = rx.try_recv() {
            out.muted(&format!("  progress {note}"))?;
        }
    }
    Ok(())
}

fn print_written(out: &StyledOut, paths: &[String]) -> Result<()> {
    let noun = if paths.len() == 1 { "file" } else { "files" };
    out.line(&format!("written {} {noun}", out.paint(style::ACCENT, &paths.len().to_string())))?;
    for path in paths {
        out.line(&format!("  - {path}"))?;
    }
    out.success("install success!")
}

async fn query(ctx: &mut ExecutionContext, state: Arc<QueryState>) -> Result<()> {
    if ctx.num_args() == 0 {
        return Err(Error::command("pass at least one query pattern"));
    }
    let out = ctx.out().clone();
    let patterns: Vec<String> = ctx.args().map(str::to_string).collect();

    let (notifier, mut notes) = if ctx.get_flag(names::PROGRESS)? {
        let (notifier, rx) = Notifier::channel();
        (notifier, Some(rx))
    } else {
        (Notifier::silent(), None)
    };

    let mut selection = select(&state.lookups, &patterns, &notifier).await?;

    if let Some(prefix) = ctx.get_string(names::SEMVER)? {
        selection.retain(|package| package.version.starts_with(&prefix));
    }

    let max = ctx.get_typed::<usize>(names::MAX)?.unwrap_or(0);
    if max > 0 && selection.len() > max {
        return Err(Error::command(format!(
            "expected at most {max} matches, found {}",
            selection.len()
        )));
    }

    drain_notes(&out, &mut notes)?;
    if selection.is_empty() {
        return out.warning("zero results");
    }

    let limit = ctx.get_typed::<usize>(names::LIMIT)?.unwrap_or(0);
    if limit > 0 {
        selection.truncate(limit);
    }
    let show_info = ctx.get_flag(names::INFO)?;
    for package in &selection {
        out.line(&format!(
            "{}  {}",
            out.paint(style::COMMAND, package.name),
            package.version
        ))?;
        if show_info {
            out.line(&format!("    {}", out.paint(style::NOTE, package.summary)))?;
        }
    }

    let Some(action) = ctx.get_string(names::ACTION)? else {
        return Ok(());
    };
    if !state.actions.has(&action) {
        return out.warning(&format!("unknown action: {action}"));
    }

    out.line(&format!("running: {}", out.paint(style::ACCENT, &action)))?;
    let overwrite = ctx.get_flag(names::OVERWRITE)?;
    let written = state
        .actions
        .run(
            &action,
            &notifier,
            |run, notes| run(selection.clone(), overwrite, notes),
            true,
        )
        .await;
    drain_notes(&out, &mut notes)?;

    match written {
        Ok(Some(paths)) => {
            print_written(&out, &paths)?;
            if ctx.get_flag(names::SAVE)? {
                let config = ctx
                    .get_string(names::CONFIG)?
                    .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
                out.muted(&format!("recorded {} package(s) in {config}", paths.len()))?;
            }
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            out.error(&format!("{action} error!"))?;
            Err(err)
        }
    }
}

async fn settings(ctx: &mut ExecutionContext) -> Result<()> {
    let path = ctx
        .get_string(names::CONFIG)?
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = ProgramConfig::load(&path)?;

    let out = ctx.out();
    out.line(&format!("{} {path}", out.paint(style::LABEL, "config:")))?;
    out.block(&serde_json::to_string_pretty(&config)?)?;

    for name in ctx.opt_names(true) {
        let value = ctx.get_string(&name)?.unwrap_or_default();
        out.line(&format!("{} {value}", out.paint(style::OPTION, &format!("--{name}:"))))?;
    }
    Ok(())
}

pub fn define(builder: &mut ProgramBuilder) -> Result<()> {
    builder.define_command(|cmd| {
        cmd.name = "version".into();
        cmd.label = "Display version".into();
        cmd.groups = vec![group::HELP.into()];
        cmd.on_execute(|ctx| async move { ctx.out().line(&super::VERSION_STRING) }.boxed());
    })?;

    builder.define_command(|cmd| {
        cmd.name = "settings".into();
        cmd.label = "Display config settings".into();
        cmd.options = vec![names::CONFIG.into()];
        cmd.groups = vec![group::SUPPORT.into()];
        cmd.on_execute(|ctx| settings(ctx).boxed());
    })?;

    let state = Arc::new(QueryState::new());
    builder.define_command(move |cmd| {
        cmd.name = "query".into();
        cmd.label = "Search packages".into();
        cmd.variadic = vec!["pattern".into()];
        cmd.groups = vec![group::QUERY.into()];
        cmd.options = [
            names::INFO,
            names::SEMVER,
            names::ACTION,
            names::OVERWRITE,
            names::SAVE,
        ]
        .into_iter()
        .map(String::from)
        .collect();
        cmd.note = vec!["patterns match package names, * matches all".into()];
        cmd.on_execute(move |ctx| query(ctx, state.clone()).boxed());
    })?;

    Ok(())
}
