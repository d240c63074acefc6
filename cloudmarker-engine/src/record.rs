//! The record envelope that flows through the audit pipeline.
//!
//! A [`Record`] carries three buckets: `raw` (provider-native payload),
//! `ext` (normalized fields a reader or evaluator derives), and `com`
//! (cross-provider bookkeeping the engine itself writes). Readers and
//! evaluators only ever see and produce `Record`s; the engine enriches
//! `com` as a record crosses a worker boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which kind of worker produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginType {
    Cloud,
    Event,
}

/// Which kind of worker consumed a record terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Store,
    Alert,
}

/// One of the two control envelopes that frame an audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMarker {
    BeginAudit,
    EndAudit,
}

impl ControlMarker {
    fn as_str(self) -> &'static str {
        match self {
            ControlMarker::BeginAudit => "begin_audit",
            ControlMarker::EndAudit => "end_audit",
        }
    }
}

/// Engine bookkeeping attached to every record as it crosses a worker.
///
/// Every field here is written by the engine, never by a plugin, except
/// `record_type` and `extra`, which plugins may populate freely; the
/// engine only ever writes its own fields and merges rather than
/// overwrites (see [`crate::merge::merge_dicts`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Com {
    pub audit_key: Option<String>,
    pub audit_version: Option<String>,
    pub origin_key: Option<String>,
    pub origin_class: Option<String>,
    pub origin_worker: Option<String>,
    pub origin_type: Option<OriginType>,
    pub target_key: Option<String>,
    pub target_class: Option<String>,
    pub target_worker: Option<String>,
    pub target_type: Option<TargetType>,
    pub record_type: Option<String>,
    /// Any `com` keys not recognized above (evaluator-defined fields).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Com {
    pub fn is_control(&self, marker: ControlMarker) -> bool {
        self.record_type.as_deref() == Some(marker.as_str())
    }
}

/// The single value type carried on the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(default)]
    pub raw: Map<String, Value>,
    #[serde(default)]
    pub ext: Map<String, Value>,
    #[serde(default)]
    pub com: Com,
}

impl Record {
    pub fn new(raw: Map<String, Value>) -> Self {
        Self {
            raw,
            ext: Map::new(),
            com: Com::default(),
        }
    }

    /// Build a `begin_audit`/`end_audit` envelope. Carries no identifying
    /// engine fields beyond `record_type` — stores and alerts use these
    /// purely to open/close output containers.
    pub fn control(marker: ControlMarker) -> Self {
        Self {
            raw: Map::new(),
            ext: Map::new(),
            com: Com {
                record_type: Some(marker.as_str().to_string()),
                ..Com::default()
            },
        }
    }

    pub fn is_control(&self, marker: ControlMarker) -> bool {
        self.com.is_control(marker)
    }

    /// Fallback routing key: prefer `com.record_type`, then fall back to
    /// a top-level `record_type` in `ext`, then `raw`. Callers should not
    /// depend on the fallback; it exists only because some sample/legacy
    /// plugins write it there.
    pub fn record_type(&self) -> Option<&str> {
        self.com
            .record_type
            .as_deref()
            .or_else(|| self.ext.get("record_type").and_then(Value::as_str))
            .or_else(|| self.raw.get("record_type").and_then(Value::as_str))
    }
}
