//! Audit runner.
//!
//! Orchestrates one audit from assembly through shutdown, enforcing a
//! ten-step ordering so that stores and alerts always see a
//! well-framed run: `begin_audit` lands on every sink queue before any
//! cloud or event worker is even started, and `end_audit` for the
//! alerts is withheld until every event worker (which can still be
//! producing alert records after the clouds are done) has exited.

use crate::error::PluginError;
use crate::graph::{AuditDescriptor, AuditSinks, AuditSources};
use crate::loader::{PluginDescriptor, PluginRegistry};
use crate::notify::Notifier;
use crate::record::{ControlMarker, Record};
use async_channel::Sender;
use chrono::Utc;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::warn;

/// Runs a single audit to completion.
pub struct AuditRunner<'a> {
    pub audit_key: String,
    pub audit_version: String,
    pub audit: &'a AuditDescriptor,
    pub plugins: &'a HashMap<String, PluginDescriptor>,
    pub registry: &'a PluginRegistry,
}

impl<'a> AuditRunner<'a> {
    pub fn new(
        audit_key: impl Into<String>,
        audit_version: impl Into<String>,
        audit: &'a AuditDescriptor,
        plugins: &'a HashMap<String, PluginDescriptor>,
        registry: &'a PluginRegistry,
    ) -> Self {
        Self {
            audit_key: audit_key.into(),
            audit_version: audit_version.into(),
            audit,
            plugins,
            registry,
        }
    }

    /// Run the audit, calling `notifier` at start and end (steps 1 and
    /// 10 below). Returns once every worker has been joined.
    pub async fn run(&self, notifier: &dyn Notifier) -> Result<(), PluginError> {
        let started = Utc::now();
        notifier.start(&self.audit_key, started).await;

        // Steps 2-3: start sinks, then frame the run with begin_audit
        // before any source exists to race it.
        let sinks = AuditSinks::assemble(
            &self.audit_key,
            &self.audit_version,
            self.audit,
            self.plugins,
            self.registry,
        )?;
        put_all(&sinks.store_queues, Record::control(ControlMarker::BeginAudit)).await;
        put_all(&sinks.alert_queues, Record::control(ControlMarker::BeginAudit)).await;

        // Step 4: start sources now that begin_audit is already queued.
        let sources = AuditSources::assemble(
            &self.audit_key,
            &self.audit_version,
            self.audit,
            self.plugins,
            self.registry,
            &sinks,
        )?;

        // Step 5.
        join_all(sources.cloud_handles).await;

        // Step 6: close stores with end_audit + sentinel; events get
        // only a sentinel — they never see control records.
        put_all(&sinks.store_queues, Record::control(ControlMarker::EndAudit)).await;
        close_all(&sinks.store_queues).await;
        close_all(&sources.event_queues).await;

        // Step 7.
        join_all(sinks.store_handles).await;
        join_all(sources.event_handles).await;

        // Step 8.
        put_all(&sinks.alert_queues, Record::control(ControlMarker::EndAudit)).await;
        close_all(&sinks.alert_queues).await;

        // Step 9.
        join_all(sinks.alert_handles).await;

        // Step 10.
        let ended = Utc::now();
        let duration = crate::notify::format_duration(ended - started);
        notifier.end(&self.audit_key, started, ended, &duration).await;

        Ok(())
    }
}

async fn put_all(queues: &[Sender<Option<Record>>], record: Record) {
    for q in queues {
        if q.send(Some(record.clone())).await.is_err() {
            warn!("queue closed before control record could be delivered");
        }
    }
}

async fn close_all(queues: &[Sender<Option<Record>>]) {
    for q in queues {
        let _ = q.send(None).await;
    }
}

async fn join_all(handles: Vec<JoinHandle<()>>) {
    for h in handles {
        if let Err(e) = h.await {
            warn!(error = %e, "worker task panicked");
        }
    }
}
