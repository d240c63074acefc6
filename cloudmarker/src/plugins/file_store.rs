//! `FileStore`: appends newline-delimited JSON to
//! `{path}/{worker}.ndjson`, buffering records in memory and writing a
//! `.tmp` file that is renamed into place in `done()` so a reader never
//! observes a half-written file.

use async_trait::async_trait;
use cloudmarker_engine::error::PluginError;
use cloudmarker_engine::plugin::{PluginInstance, StoreSink};
use cloudmarker_engine::record::{ControlMarker, Record};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
struct Params {
    path: String,
}

pub struct FileStore {
    dir: PathBuf,
    worker_name: Option<String>,
    lines: Vec<String>,
}

impl FileStore {
    pub fn construct(params: &Map<String, Value>) -> Result<PluginInstance, String> {
        let params: Params =
            serde_json::from_value(Value::Object(params.clone())).map_err(|e| e.to_string())?;
        Ok(PluginInstance::Store(Box::new(FileStore {
            dir: PathBuf::from(params.path),
            worker_name: None,
            lines: Vec::new(),
        })))
    }
}

#[async_trait]
impl StoreSink for FileStore {
    async fn write(&mut self, record: Record) -> Result<(), PluginError> {
        if self.worker_name.is_none() {
            self.worker_name = record.com.target_worker.clone();
        }
        if record.is_control(ControlMarker::BeginAudit) || record.is_control(ControlMarker::EndAudit) {
            return Ok(());
        }
        let line = serde_json::to_string(&record).map_err(|e| PluginError::Runtime {
            worker: self.worker_name.clone().unwrap_or_default(),
            method: "write",
            message: e.to_string(),
        })?;
        self.lines.push(line);
        Ok(())
    }

    async fn done(&mut self) {
        let worker = self.worker_name.clone().unwrap_or_else(|| "unknown".to_string());
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            tracing::error!(worker = %worker, error = %e, "failed to create file store directory");
            return;
        }

        let tmp_path = self.dir.join(format!("{worker}.ndjson.tmp"));
        let final_path = self.dir.join(format!("{worker}.ndjson"));
        let mut content = self.lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }

        if let Err(e) = tokio::fs::write(&tmp_path, content).await {
            tracing::error!(worker = %worker, error = %e, "failed to write file store buffer");
            return;
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            tracing::error!(worker = %worker, error = %e, "failed to finalize file store output");
        }
    }
}
