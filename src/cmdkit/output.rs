//! # Styled Output
//!
//! Everything the engine and the commands print goes through a [`StyledOut`]. It pairs a
//! [`Theme`] of named `console` styles with a color switch and a destination.
//!
//! Templates never contain ANSI codes. They name styles through a `style` filter:
//!
//! ```jinja
//! {{ title | style("header") }}
//! {{ "--limit" | style("option") }}  {{ description | style("description") }}
//! ```
//!
//! [`render_template`] registers that filter on a fresh minijinja environment. With color off
//! the filter returns the text unchanged, but a style name missing from the theme still gets
//! the `(!?)` indicator so typos show up in plain output too.
//!
//! Writers return `Result<()>`; the sink decides where bytes land: the terminal (via
//! `console::Term`) or a shared in-memory buffer that tests read back.

use crate::error::Result;
use console::{Style, Term};
use minijinja::{Environment, Value};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Prefix shown when a style name is not found.
pub const MISSING_STYLE_INDICATOR: &str = "(!?)";

pub mod names {
    pub const HEADER: &str = "header";
    pub const DIVIDER: &str = "divider";
    pub const COMMAND: &str = "command";
    pub const LABEL: &str = "label";
    pub const OPTION: &str = "option";
    pub const SHORT: &str = "short";
    pub const DESCRIPTION: &str = "description";
    pub const NOTE: &str = "note";
    pub const PLAIN: &str = "plain";
    pub const ACCENT: &str = "accent";
    pub const WARNING: &str = "warning";
    pub const ERROR: &str = "error";
    pub const SUCCESS: &str = "success";
    pub const MUTED: &str = "muted";
}

/// A collection of named styles applied through the `style` template filter.
#[derive(Clone)]
pub struct Theme {
    styles: HashMap<String, Style>,
    missing_indicator: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            styles: HashMap::new(),
            missing_indicator: MISSING_STYLE_INDICATOR.to_string(),
        }
    }
}

impl fmt::Debug for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.styles.keys().collect();
        names.sort();
        f.debug_struct("Theme").field("styles", &names).finish()
    }
}

impl Theme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a named style.
    pub fn add(mut self, name: &str, style: Style) -> Self {
        self.styles.insert(name.to_string(), style);
        self
    }

    /// Sets the indicator prepended to text whose style is unknown. Empty disables it.
    pub fn missing_indicator(mut self, indicator: &str) -> Self {
        self.missing_indicator = indicator.to_string();
        self
    }

    pub fn has(&self, name: &str) -> bool {
        self.styles.contains_key(name)
    }

    pub fn apply(&self, name: &str, text: &str) -> String {
        match self.styles.get(name) {
            // force_styling: the caller already decided color is wanted
            Some(style) => style.clone().force_styling(true).apply_to(text).to_string(),
            None => self.flag_missing(text),
        }
    }

    pub fn apply_plain(&self, name: &str, text: &str) -> String {
        if self.has(name) {
            text.to_string()
        } else {
            self.flag_missing(text)
        }
    }

    fn flag_missing(&self, text: &str) -> String {
        if self.missing_indicator.is_empty() {
            text.to_string()
        } else {
            format!("{} {}", self.missing_indicator, text)
        }
    }
}

pub static DEFAULT_THEME: Lazy<Theme> = Lazy::new(|| {
    Theme::new()
        .add(names::HEADER, Style::new().bold())
        .add(names::DIVIDER, Style::new().dim())
        .add(names::COMMAND, Style::new().green())
        .add(names::LABEL, Style::new())
        .add(names::OPTION, Style::new().cyan())
        .add(names::SHORT, Style::new().cyan().dim())
        .add(names::DESCRIPTION, Style::new())
        .add(names::NOTE, Style::new().dim().italic())
        .add(names::PLAIN, Style::new())
        .add(names::ACCENT, Style::new().magenta())
        .add(names::WARNING, Style::new().yellow())
        .add(names::ERROR, Style::new().red().bold())
        .add(names::SUCCESS, Style::new().green())
        .add(names::MUTED, Style::new().dim())
});

/// Renders a minijinja template with a `style` filter bound to `theme`.
pub fn render_template<T: Serialize>(
    template: &str,
    data: &T,
    theme: &Theme,
    use_color: bool,
) -> std::result::Result<String, minijinja::Error> {
    let mut env = Environment::new();
    register_style_filter(&mut env, theme.clone(), use_color);
    env.add_template_owned("_inline".to_string(), template.to_string())?;
    env.get_template("_inline")?.render(data)
}

fn register_style_filter(env: &mut Environment<'static>, theme: Theme, use_color: bool) {
    env.add_filter("style", move |value: Value, name: String| -> String {
        let text = value.to_string();
        if use_color {
            theme.apply(&name, &text)
        } else {
            theme.apply_plain(&name, &text)
        }
    });
}

#[derive(Clone)]
enum Sink {
    Stdout,
    Stderr,
    Buffer(Arc<Mutex<Vec<u8>>>),
}

/// Styled writer carried by every invocation context.
#[derive(Clone)]
pub struct StyledOut {
    theme: Arc<Theme>,
    use_color: bool,
    sink: Sink,
}

impl fmt::Debug for StyledOut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match self.sink {
            Sink::Stdout => "stdout",
            Sink::Stderr => "stderr",
            Sink::Buffer(_) => "buffer",
        };
        f.debug_struct("StyledOut")
            .field("use_color", &self.use_color)
            .field("sink", &sink)
            .finish()
    }
}

impl Default for StyledOut {
    fn default() -> Self {
        Self::stdout(Term::stdout().features().colors_supported())
    }
}

impl StyledOut {
    pub fn stdout(use_color: bool) -> Self {
        Self {
            theme: Arc::new(DEFAULT_THEME.clone()),
            use_color,
            sink: Sink::Stdout,
        }
    }

    pub fn stderr(use_color: bool) -> Self {
        Self {
            sink: Sink::Stderr,
            ..Self::stdout(use_color)
        }
    }

    /// Writes into a shared buffer instead of the terminal. Color is off.
    pub fn buffered() -> Self {
        Self {
            sink: Sink::Buffer(Arc::new(Mutex::new(Vec::new()))),
            ..Self::stdout(false)
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = Arc::new(theme);
        self
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    /// Applies a named style, honoring the color switch.
    pub fn paint(&self, style: &str, text: &str) -> String {
        if self.use_color {
            self.theme.apply(style, text)
        } else {
            self.theme.apply_plain(style, text)
        }
    }

    /// Writes `text` followed by a newline.
    pub fn line(&self, text: &str) -> Result<()> {
        match &self.sink {
            Sink::Stdout => Term::stdout().write_line(text)?,
            Sink::Stderr => Term::stderr().write_line(text)?,
            Sink::Buffer(buffer) => {
                let mut buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
                buffer.write_all(text.as_bytes())?;
                buffer.write_all(b"\n")?;
            }
        }
        Ok(())
    }

    /// Writes a multi-line block, dropping trailing whitespace.
    pub fn block(&self, text: &str) -> Result<()> {
        self.line(text.trim_end())
    }

    pub fn accent(&self, text: &str) -> Result<()> {
        self.line(&self.paint(names::ACCENT, text))
    }

    pub fn warning(&self, text: &str) -> Result<()> {
        self.line(&self.paint(names::WARNING, text))
    }

    pub fn error(&self, text: &str) -> Result<()> {
        self.line(&self.paint(names::ERROR, text))
    }

    pub fn success(&self, text: &str) -> Result<()> {
        self.line(&self.paint(names::SUCCESS, text))
    }

    pub fn muted(&self, text: &str) -> Result<()> {
        self.line(&self.paint(names::MUTED, text))
    }

    /// Everything written so far, for buffered writers.
    pub fn contents(&self) -> Option<String> {
        match &self.sink {
            Sink::Buffer(buffer) => {
                let buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
                Some(String::from_utf8_lossy(&buffer).into_owned())
            }
            _ => None,
        }
    }
}
