//! Plugin-graph audit engine: the record model, the plugin contract,
//! the plugin loader, the concurrent I/O worker pool, the audit graph,
//! the audit runner and the job supervisor. Concrete cloud readers,
//! rule evaluators, and store/alert backends are collaborators that
//! implement [`plugin`]'s traits and register with a
//! [`loader::PluginRegistry`]; none of them live here.

pub mod error;
pub mod graph;
pub mod ioworkers;
pub mod loader;
pub mod merge;
pub mod notify;
pub mod plugin;
pub mod record;
pub mod runner;
pub mod supervisor;
pub mod util;
