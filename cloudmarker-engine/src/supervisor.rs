//! Job supervisor.
//!
//! Given a configuration and the audit keys to run, builds one
//! [`crate::runner::AuditRunner`] per key, runs them all concurrently,
//! waits for every one to finish, and brackets the whole set with a
//! run-level start/end notification. The wall-clock trigger that calls
//! this repeatedly on a schedule is an external collaborator; this
//! type only knows how to run a batch of audits once.

use crate::error::PluginError;
use crate::graph::AuditDescriptor;
use crate::loader::{PluginDescriptor, PluginRegistry};
use crate::notify::Notifier;
use crate::runner::AuditRunner;
use chrono::Utc;
use futures::future::join_all;
use std::collections::HashMap;
use tracing::{error, info};
use uuid::Uuid;

/// Subject used for the run-level notification bracket.
pub const ALL_AUDITS: &str = "all audits";

pub struct JobSupervisor<'a> {
    pub audit_version: String,
    pub audits: &'a HashMap<String, AuditDescriptor>,
    pub plugins: &'a HashMap<String, PluginDescriptor>,
    pub registry: &'a PluginRegistry,
}

impl<'a> JobSupervisor<'a> {
    pub fn new(
        audit_version: impl Into<String>,
        audits: &'a HashMap<String, AuditDescriptor>,
        plugins: &'a HashMap<String, PluginDescriptor>,
        registry: &'a PluginRegistry,
    ) -> Self {
        Self {
            audit_version: audit_version.into(),
            audits,
            plugins,
            registry,
        }
    }

    /// Run every key in `run_keys` concurrently and wait for them all.
    /// A missing audit key is logged and skipped rather than failing the
    /// whole batch — the rest of the configured run still executes.
    pub async fn run_once(&self, run_keys: &[String], notifier: &dyn Notifier) {
        let run_id = Uuid::new_v4();
        let started = Utc::now();
        info!(run_id = %run_id, audit_keys = ?run_keys, "starting scheduled run");
        notifier.start(ALL_AUDITS, started).await;

        let resolved: Vec<(&String, AuditRunner<'_>)> = run_keys
            .iter()
            .filter_map(|key| match self.audits.get(key) {
                Some(audit) => Some((
                    key,
                    AuditRunner::new(
                        key.clone(),
                        self.audit_version.clone(),
                        audit,
                        self.plugins,
                        self.registry,
                    ),
                )),
                None => {
                    error!(run_id = %run_id, audit_key = %key, "configured run key has no matching audit");
                    None
                }
            })
            .collect();

        let outcomes: Vec<Result<(), PluginError>> =
            join_all(resolved.iter().map(|(_, r)| r.run(notifier))).await;
        for ((key, _), outcome) in resolved.iter().zip(outcomes) {
            if let Err(e) = outcome {
                error!(run_id = %run_id, audit_key = %key, error = %e, "audit failed to assemble");
            }
        }

        let ended = Utc::now();
        let duration = crate::notify::format_duration(ended - started);
        info!(run_id = %run_id, "scheduled run finished");
        notifier.end(ALL_AUDITS, started, ended, &duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NullNotifier;

    #[tokio::test]
    async fn missing_audit_key_is_skipped_not_fatal() {
        let audits = HashMap::new();
        let plugins = HashMap::new();
        let registry = PluginRegistry::new();
        let supervisor = JobSupervisor::new("1", &audits, &plugins, &registry);
        // Should not panic even though "nope" names no audit.
        supervisor.run_once(&["nope".to_string()], &NullNotifier).await;
    }

    #[tokio::test]
    async fn runs_multiple_audits_concurrently() {
        let mut audits = HashMap::new();
        audits.insert("a1".to_string(), AuditDescriptor::default());
        audits.insert("a2".to_string(), AuditDescriptor::default());
        let plugins: HashMap<String, PluginDescriptor> = HashMap::new();
        let registry = PluginRegistry::new();
        let supervisor = JobSupervisor::new("1", &audits, &plugins, &registry);
        supervisor
            .run_once(&["a1".to_string(), "a2".to_string()], &NullNotifier)
            .await;
    }
}
