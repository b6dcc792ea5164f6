//! # Trellis Scripting Engine
//!
//! Parses event-driven scripts written in near-natural language and runs
//! them against a host.
//!
//! ## Pipeline
//! - **Registration**: hosts register types, converters, comparators and
//!   syntax elements on a [`RegistryBuilder`], then close it
//! - **Parsing**: script text is read into section nodes, each line is
//!   matched against the registered patterns and built into a trigger graph
//! - **Execution**: host events are dispatched to triggers, which are walked
//!   item by item and may suspend on delays
//!
//! ## Example
//! ```no_run
//! use trellis_scripting::ScriptEngine;
//!
//! # fn main() -> trellis_scripting::Result<()> {
//! let engine = ScriptEngine::with_defaults()?;
//! let report = engine.load_source("hello.sk", "on load:\n    broadcast \"hello\"\n");
//! assert_eq!(report.errors, 0);
//! engine.tick();
//! # Ok(())
//! # }
//! ```

pub mod builtins;
pub mod compare;
pub mod context;
pub mod convert;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod event;
pub mod expr;
pub mod kleenean;
pub mod loader;
pub mod log;
pub mod node;
pub mod parser;
pub mod pattern;
pub mod registry;
pub mod runtime;
pub mod scheduler;
pub mod syntax;
pub mod trigger;
pub mod types;
pub mod value;
pub mod variables;

pub use compare::Relation;
pub use context::TriggerContext;
pub use engine::ScriptEngine;
pub use error::{Result, ScriptError};
pub use event::{Event, EventClass};
pub use kleenean::Kleenean;
pub use loader::{LoadReport, ScriptReport};
pub use parser::ParserState;
pub use registry::{EventFactory, ExpressionPriority, Registry, RegistryBuilder};
pub use runtime::{EngineOptions, Host, LogHost, Runtime};
pub use syntax::{CheckedEvent, Condition, Effect, Expression, Flow, ParseResult, SelfRegisteringEvent, SyntaxElement};
pub use types::ClassInfo;
pub use value::{HostObject, Value};
