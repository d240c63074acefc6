//! Audit graph assembly and worker tasks.
//!
//! An audit is a declarative wiring of cloud readers into store and
//! event-evaluator queues, and event evaluators into alert queues.
//! Assembly is split into two phases so [`crate::runner::AuditRunner`]
//! can enforce the runner's start ordering: [`AuditSinks::assemble`]
//! instantiates alerts then stores and starts their workers;
//! [`AuditSources::assemble`] instantiates events then clouds, wired to
//! the sink queues already created, and starts their workers. The
//! runner calls the first phase, injects `begin_audit`, then calls the
//! second — so no cloud or event worker can produce a record before
//! every sink has one waiting for it.

use crate::error::PluginError;
use crate::loader::{PluginDescriptor, PluginRegistry};
use crate::merge::merge_dicts;
use crate::plugin::PluginInstance;
use crate::record::{ControlMarker, OriginType, Record, TargetType};
use async_channel::{Receiver, Sender};
use futures::future::{AssertUnwindSafe, FutureExt};
use futures::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::error;

/// Default bound on every inter-worker queue. Large enough that a slow
/// sink rarely applies backpressure to its producer in practice, while
/// still giving bounded-queue backpressure against a stuck consumer.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// Declarative wiring for a single audit.
#[derive(Debug, Clone, Default)]
pub struct AuditDescriptor {
    pub clouds: Vec<String>,
    pub events: Vec<String>,
    pub stores: Vec<String>,
    pub alerts: Vec<String>,
}

type RecordQueue = (Sender<Option<Record>>, Receiver<Option<Record>>);

fn record_queue() -> RecordQueue {
    async_channel::bounded(DEFAULT_QUEUE_CAPACITY)
}

/// The sink half of an audit graph: alert and store workers, already
/// running, plus the queues used to feed them.
pub struct AuditSinks {
    pub store_queues: Vec<Sender<Option<Record>>>,
    pub alert_queues: Vec<Sender<Option<Record>>>,
    pub store_handles: Vec<JoinHandle<()>>,
    pub alert_handles: Vec<JoinHandle<()>>,
}

/// The source half of an audit graph: event and cloud workers, already
/// running and wired to a prior [`AuditSinks`].
pub struct AuditSources {
    pub event_queues: Vec<Sender<Option<Record>>>,
    pub cloud_handles: Vec<JoinHandle<()>>,
    pub event_handles: Vec<JoinHandle<()>>,
}

impl AuditSinks {
    /// Instantiate every alert then every store plugin and start their
    /// workers, in that order.
    pub fn assemble(
        audit_key: &str,
        audit_version: &str,
        audit: &AuditDescriptor,
        plugins: &std::collections::HashMap<String, PluginDescriptor>,
        registry: &PluginRegistry,
    ) -> Result<Self, PluginError> {
        let mut alert_queues = Vec::new();
        let mut alert_handles = Vec::new();
        for key in &audit.alerts {
            let (instance, class) = load_as(registry, plugins, key, "alert")?;
            let PluginInstance::Alert(plugin) = instance else {
                unreachable!("load_as guarantees role match")
            };
            let (tx, rx) = record_queue();
            let worker_name = format!("{audit_key}_{key}");
            alert_handles.push(tokio::spawn(write_worker(
                worker_name,
                audit_key.to_string(),
                audit_version.to_string(),
                key.clone(),
                class,
                Sink::Alert(plugin),
                rx,
            )));
            alert_queues.push(tx);
        }

        let mut store_queues = Vec::new();
        let mut store_handles = Vec::new();
        for key in &audit.stores {
            let (instance, class) = load_as(registry, plugins, key, "store")?;
            let PluginInstance::Store(plugin) = instance else {
                unreachable!("load_as guarantees role match")
            };
            let (tx, rx) = record_queue();
            let worker_name = format!("{audit_key}_{key}");
            store_handles.push(tokio::spawn(write_worker(
                worker_name,
                audit_key.to_string(),
                audit_version.to_string(),
                key.clone(),
                class,
                Sink::Store(plugin),
                rx,
            )));
            store_queues.push(tx);
        }

        Ok(Self {
            store_queues,
            alert_queues,
            store_handles,
            alert_handles,
        })
    }
}

impl AuditSources {
    /// Instantiate every event evaluator then every cloud reader and
    /// start their workers, fanning event output to `sinks.alert_queues`
    /// and cloud output to `sinks.store_queues` plus the fresh event
    /// queues.
    pub fn assemble(
        audit_key: &str,
        audit_version: &str,
        audit: &AuditDescriptor,
        plugins: &std::collections::HashMap<String, PluginDescriptor>,
        registry: &PluginRegistry,
        sinks: &AuditSinks,
    ) -> Result<Self, PluginError> {
        let mut event_queues = Vec::new();
        let mut event_handles = Vec::new();
        for key in &audit.events {
            let (instance, class) = load_as(registry, plugins, key, "event")?;
            let PluginInstance::Event(plugin) = instance else {
                unreachable!("load_as guarantees role match")
            };
            let (tx, rx) = record_queue();
            let worker_name = format!("{audit_key}_{key}");
            event_handles.push(tokio::spawn(event_worker(
                worker_name,
                audit_key.to_string(),
                audit_version.to_string(),
                key.clone(),
                class,
                plugin,
                rx,
                sinks.alert_queues.clone(),
            )));
            event_queues.push(tx);
        }

        let mut cloud_handles = Vec::new();
        for key in &audit.clouds {
            let (instance, class) = load_as(registry, plugins, key, "cloud")?;
            let PluginInstance::Cloud(plugin) = instance else {
                unreachable!("load_as guarantees role match")
            };
            let worker_name = format!("{audit_key}_{key}");
            let mut downstream = sinks.store_queues.clone();
            downstream.extend(event_queues.clone());
            cloud_handles.push(tokio::spawn(cloud_worker(
                worker_name,
                audit_key.to_string(),
                audit_version.to_string(),
                key.clone(),
                class,
                plugin,
                downstream,
            )));
        }

        Ok(Self {
            event_queues,
            cloud_handles,
            event_handles,
        })
    }
}

fn load_as(
    registry: &PluginRegistry,
    plugins: &std::collections::HashMap<String, PluginDescriptor>,
    key: &str,
    expected_role: &str,
) -> Result<(PluginInstance, String), PluginError> {
    let descriptor = plugins
        .get(key)
        .ok_or_else(|| PluginError::Unresolvable(key.to_string()))?;
    let instance = registry.load(descriptor)?;
    if instance.role() != expected_role {
        return Err(PluginError::Construction {
            class: descriptor.class.clone(),
            message: format!(
                "plugin key '{key}' is wired as {expected_role} but its class is a {} plugin",
                instance.role()
            ),
        });
    }
    Ok((instance, descriptor.class.clone()))
}

/// Merge engine bookkeeping into a record's `com`, without clobbering
/// fields an evaluator already populated there.
fn enrich_com(record: &mut Record, engine_com: Value) {
    let existing = serde_json::to_value(&record.com).unwrap_or(Value::Null);
    let merged = merge_dicts(&existing, &engine_com);
    if let Ok(com) = serde_json::from_value(merged) {
        record.com = com;
    }
}

async fn cloud_worker(
    worker_name: String,
    audit_key: String,
    audit_version: String,
    plugin_key: String,
    plugin_class: String,
    mut plugin: Box<dyn crate::plugin::CloudReader>,
    output_queues: Vec<Sender<Option<Record>>>,
) {
    tracing::info!("{worker_name}: started");

    let mut stream = plugin.read();
    loop {
        match AssertUnwindSafe(stream.next()).catch_unwind().await {
            Ok(Some(Ok(mut record))) => {
                let engine_com = serde_json::json!({
                    "audit_key": audit_key,
                    "audit_version": audit_version,
                    "origin_key": plugin_key,
                    "origin_class": plugin_class,
                    "origin_worker": worker_name,
                    "origin_type": OriginType::Cloud,
                });
                enrich_com(&mut record, engine_com);
                for q in &output_queues {
                    let _ = q.send(Some(record.clone())).await;
                }
            }
            Ok(Some(Err(e))) => {
                error!(worker = %worker_name, method = "read", error = %e, "plugin call failed");
            }
            Ok(None) => break,
            Err(_) => {
                error!(worker = %worker_name, method = "read", "plugin call panicked, ending reader");
                break;
            }
        }
    }

    if AssertUnwindSafe(plugin.done()).catch_unwind().await.is_err() {
        error!(worker = %worker_name, method = "done", "plugin call panicked");
    }
    tracing::info!("{worker_name}: stopped");
}

async fn event_worker(
    worker_name: String,
    audit_key: String,
    audit_version: String,
    plugin_key: String,
    plugin_class: String,
    mut plugin: Box<dyn crate::plugin::EventEvaluator>,
    input_queue: Receiver<Option<Record>>,
    output_queues: Vec<Sender<Option<Record>>>,
) {
    tracing::info!("{worker_name}: started");

    while let Ok(Some(record)) = input_queue.recv().await {
        let mut derived = match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| plugin.eval(&record))) {
            Ok(stream) => stream,
            Err(_) => {
                error!(worker = %worker_name, method = "eval", "plugin call panicked, dropping this input's derivations");
                continue;
            }
        };
        loop {
            match AssertUnwindSafe(derived.next()).catch_unwind().await {
                Ok(Some(Ok(mut event_record))) => {
                    let engine_com = serde_json::json!({
                        "audit_key": audit_key,
                        "audit_version": audit_version,
                        "origin_key": plugin_key,
                        "origin_class": plugin_class,
                        "origin_worker": worker_name,
                        "origin_type": OriginType::Event,
                    });
                    enrich_com(&mut event_record, engine_com);
                    for q in &output_queues {
                        let _ = q.send(Some(event_record.clone())).await;
                    }
                }
                Ok(Some(Err(e))) => {
                    error!(worker = %worker_name, method = "eval", error = %e, "plugin call failed");
                }
                Ok(None) => break,
                Err(_) => {
                    error!(worker = %worker_name, method = "eval", "plugin call panicked, dropping this input's remaining derivations");
                    break;
                }
            }
        }
    }

    if AssertUnwindSafe(plugin.done()).catch_unwind().await.is_err() {
        error!(worker = %worker_name, method = "done", "plugin call panicked");
    }
    tracing::info!("{worker_name}: stopped");
}

/// Wraps either sink role so store and alert workers share one loop.
enum Sink {
    Store(Box<dyn crate::plugin::StoreSink>),
    Alert(Box<dyn crate::plugin::AlertSink>),
}

impl Sink {
    async fn write(&mut self, record: Record) -> Result<(), PluginError> {
        match self {
            Sink::Store(s) => s.write(record).await,
            Sink::Alert(s) => s.write(record).await,
        }
    }

    async fn done(&mut self) {
        match self {
            Sink::Store(s) => s.done().await,
            Sink::Alert(s) => s.done().await,
        }
    }

    fn target_type(&self) -> TargetType {
        match self {
            Sink::Store(_) => TargetType::Store,
            Sink::Alert(_) => TargetType::Alert,
        }
    }
}

async fn write_worker(
    worker_name: String,
    audit_key: String,
    audit_version: String,
    plugin_key: String,
    plugin_class: String,
    mut sink: Sink,
    input_queue: Receiver<Option<Record>>,
) {
    tracing::info!("{worker_name}: started");
    let target_type = sink.target_type();

    while let Ok(Some(mut record)) = input_queue.recv().await {
        if !record.is_control(ControlMarker::BeginAudit) && !record.is_control(ControlMarker::EndAudit)
        {
            let engine_com = serde_json::json!({
                "audit_key": audit_key,
                "audit_version": audit_version,
                "target_key": plugin_key,
                "target_class": plugin_class,
                "target_worker": worker_name,
                "target_type": target_type,
            });
            enrich_com(&mut record, engine_com);
        }

        match AssertUnwindSafe(sink.write(record)).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(worker = %worker_name, method = "write", error = %e, "plugin call failed");
            }
            Err(_) => {
                error!(worker = %worker_name, method = "write", "plugin call panicked, dropping this record");
            }
        }
    }

    if AssertUnwindSafe(sink.done()).catch_unwind().await.is_err() {
        error!(worker = %worker_name, method = "done", "plugin call panicked");
    }
    tracing::info!("{worker_name}: stopped");
}
