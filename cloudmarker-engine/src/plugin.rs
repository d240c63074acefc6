//! The four plugin roles.
//!
//! Every plugin implements exactly one of these traits. A plugin
//! instance is created at audit start, driven through its role's
//! methods during the run, receives exactly one `done()` call at run
//! end, and is then discarded — the engine never reuses an instance
//! across runs.

use crate::error::PluginError;
use crate::record::Record;
use async_trait::async_trait;
use futures::stream::Stream;
use std::pin::Pin;

/// A lazy, finite sequence of records. Errors are carried as stream
/// items rather than failing the stream outright, so a single bad
/// record does not end a reader or evaluator's output early — see
/// `graph.rs` for how each error item is handled.
pub type RecordStream = Pin<Box<dyn Stream<Item = Result<Record, PluginError>> + Send>>;

/// Produces records from an external cloud provider. Non-restartable:
/// `read()` is called exactly once per instance.
#[async_trait]
pub trait CloudReader: Send + Sync {
    fn read(&mut self) -> RecordStream;

    /// Release reader resources. Called exactly once, after `read()`'s
    /// stream is exhausted or abandoned on error.
    async fn done(&mut self);
}

/// Derives zero or more records from a single input record.
#[async_trait]
pub trait EventEvaluator: Send + Sync {
    fn eval(&self, record: &Record) -> RecordStream;

    async fn done(&mut self);
}

/// A terminal sink for audit records (store role).
#[async_trait]
pub trait StoreSink: Send + Sync {
    async fn write(&mut self, record: Record) -> Result<(), PluginError>;

    /// Flush buffers and close connections. Called exactly once.
    async fn done(&mut self);
}

/// A terminal sink for audit records (alert role).
///
/// Identical contract to [`StoreSink`]; kept as a separate trait so the
/// audit graph's wiring cannot mix up which queue a plugin is attached
/// to at the type level — the distinction between the two roles is
/// purely which queue a plugin is attached to.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn write(&mut self, record: Record) -> Result<(), PluginError>;

    async fn done(&mut self);
}

/// A loaded plugin, tagged by role.
pub enum PluginInstance {
    Cloud(Box<dyn CloudReader>),
    Event(Box<dyn EventEvaluator>),
    Store(Box<dyn StoreSink>),
    Alert(Box<dyn AlertSink>),
}

impl PluginInstance {
    pub fn role(&self) -> &'static str {
        match self {
            PluginInstance::Cloud(_) => "cloud",
            PluginInstance::Event(_) => "event",
            PluginInstance::Store(_) => "store",
            PluginInstance::Alert(_) => "alert",
        }
    }
}
