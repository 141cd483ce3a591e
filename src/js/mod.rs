//! JavaScript Engine Module
//!
//! A Boa engine on a dedicated thread, driven by commands that carry
//! one-shot replies. Used to host script compute modules.

mod client;
mod engine;
mod esm;

pub use client::JsEngineClient;
pub use engine::{JsCommand, JsEngine};

/// Argument passed to an exported function.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptArg {
    Text(String),
    Int(i32),
}

/// A JS return value, converted on the engine thread.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Text(String),
    Number(f64),
    Bool(bool),
    /// Anything else, rendered for diagnostics.
    Other(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("JavaScript error: {0}")]
    Js(String),

    #[error("module '{0}' did not finish evaluating")]
    Unsettled(String),

    #[error("no module has been loaded")]
    NoModule,

    #[error("module does not export `{0}`")]
    MissingExport(String),

    #[error("export `{0}` is not a function")]
    NotCallable(String),

    #[error("JS engine is not running")]
    EngineGone,
}
