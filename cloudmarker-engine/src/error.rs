//! Error taxonomy for the audit engine.
//!
//! Configuration and plugin-construction errors are fatal to the
//! component that raised them (a requested audit, a single worker);
//! runtime errors during `read`/`eval`/`write`/`done` are isolated by
//! the workers in [`crate::graph`] and never surface as [`EngineError`]
//! — they are logged in place instead.

use thiserror::Error;

/// Errors raised while resolving and constructing a plugin.
#[derive(Error, Debug)]
pub enum PluginError {
    /// `class` has no separator between its module path and type name.
    #[error("plugin class '{0}' is missing a package/class separator")]
    Misconfigured(String),

    /// `class` is not registered with the loader.
    #[error("plugin class '{0}' is not registered")]
    Unresolvable(String),

    /// The plugin's constructor rejected its parameters.
    #[error("failed to construct plugin '{class}': {message}")]
    Construction { class: String, message: String },

    /// A plugin method failed during a run. Carried here only for
    /// logging; workers never propagate this variant outward.
    #[error("plugin '{worker}' failed in {method}(): {message}")]
    Runtime {
        worker: String,
        method: &'static str,
        message: String,
    },
}

/// Top-level error type for the engine crate.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
