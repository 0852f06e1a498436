//! # Cmdkit Architecture
//!
//! Cmdkit is a **declarative command library**. A program declares options, commands and groups
//! up front; the engine turns raw argv into a call to one command body, and the help renderer
//! turns the same declarations into grouped usage text. Nothing is discovered at runtime.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Program (engine.rs)                                        │
//! │  - tokenize, apply option effects, resolve, run hooks       │
//! │  - The ONLY place that knows about exit codes               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Context (context.rs, args.rs, coerce.rs)                   │
//! │  - Positional queue and named options of one invocation     │
//! │  - Typed access with defaults and enum validation           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Registry (registry.rs, sort.rs)                            │
//! │  - Option, command and group definitions                    │
//! │  - Validated once, frozen afterwards                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Command bodies receive the context and write through its [`StyledOut`], so the same program
//! can print to a terminal or into a buffer under test.
//!
//! ## Helpers for command bodies
//!
//! - [`ActionMap`]: named async actions run one by one or as a serial chain
//! - [`PromiseStash`]: shares one in-flight result per key between concurrent callers
//!
//! ## Module Overview
//!
//! - **`engine`**: [`ProgramBuilder`], [`Program`] and [`ExecutionResult`]
//! - **`registry`**: definitions and validation
//! - **`args`**: argv tokenizing (clap based)
//! - **`context`**: per-invocation state
//! - **`coerce`**: option value types
//! - **`help`**: grouped usage text
//! - **`output`**: themes and styled writers
//! - **`config`**: program settings (JSON)
//! - **`logging`**: tracing subscriber setup
//! - **`error`**: [`Error`] and [`Result`]

pub mod actions;
pub mod args;
pub mod coerce;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod help;
pub mod logging;
pub mod output;
pub mod registry;
pub mod sort;
pub mod stash;
mod templates;

pub use actions::ActionMap;
pub use args::{ArgBag, ClapTokenizer, RawValue, Tokenizer};
pub use coerce::OptionType;
pub use config::{ColorChoice, ProgramConfig};
pub use context::ExecutionContext;
pub use engine::{ExecutionResult, Program, ProgramBuilder};
pub use error::{DefinitionKind, Error, Result};
pub use output::{StyledOut, Theme};
pub use registry::{CommandDef, GroupDef, Hook, OptionDef, Registry};
pub use stash::{Deferred, Notifier, Promise, PromiseStash};
