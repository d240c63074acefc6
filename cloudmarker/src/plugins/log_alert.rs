//! `LogAlert`: emits one `tracing::warn!` per record, standing in for
//! a push-notification sink that would otherwise talk to a real SMTP
//! server.

use async_trait::async_trait;
use cloudmarker_engine::error::PluginError;
use cloudmarker_engine::plugin::{AlertSink, PluginInstance};
use cloudmarker_engine::record::{ControlMarker, Record};
use serde_json::{Map, Value};

#[derive(Default)]
pub struct LogAlert;

impl LogAlert {
    pub fn construct(_params: &Map<String, Value>) -> Result<PluginInstance, String> {
        Ok(PluginInstance::Alert(Box::new(LogAlert)))
    }
}

#[async_trait]
impl AlertSink for LogAlert {
    async fn write(&mut self, record: Record) -> Result<(), PluginError> {
        if record.is_control(ControlMarker::BeginAudit) || record.is_control(ControlMarker::EndAudit) {
            return Ok(());
        }
        tracing::warn!(
            origin_worker = ?record.com.origin_worker,
            record_type = ?record.record_type(),
            "alert"
        );
        Ok(())
    }

    async fn done(&mut self) {}
}
