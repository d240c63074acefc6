//! `MockCloud`: yields `record_count` records cycling through
//! `record_types`.

use async_trait::async_trait;
use cloudmarker_engine::plugin::{CloudReader, PluginInstance, RecordStream};
use cloudmarker_engine::record::Record;
use futures::stream;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Deserialize)]
struct Params {
    #[serde(default = "default_record_count")]
    record_count: u64,
    #[serde(default = "default_record_types")]
    record_types: Vec<String>,
}

fn default_record_count() -> u64 {
    10
}

fn default_record_types() -> Vec<String> {
    vec!["mock_record".to_string()]
}

pub struct MockCloud {
    record_count: u64,
    record_types: Vec<String>,
}

impl MockCloud {
    pub fn construct(params: &Map<String, Value>) -> Result<PluginInstance, String> {
        let params: Params =
            serde_json::from_value(Value::Object(params.clone())).map_err(|e| e.to_string())?;
        Ok(PluginInstance::Cloud(Box::new(MockCloud {
            record_count: params.record_count,
            record_types: params.record_types,
        })))
    }
}

#[async_trait]
impl CloudReader for MockCloud {
    fn read(&mut self) -> RecordStream {
        let mut record_types = self.record_types.clone();
        if record_types.is_empty() {
            record_types = default_record_types();
        }
        let n = self.record_count;
        Box::pin(stream::iter((0..n).map(move |i| {
            let record_type = &record_types[(i as usize) % record_types.len()];
            let mut record = Record::default();
            record.raw.insert("record_num".into(), json!(i));
            record.raw.insert("record_type".into(), json!(record_type));
            Ok(record)
        })))
    }

    async fn done(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn yields_record_count_records_cycling_types() {
        let mut params = Map::new();
        params.insert("record_count".into(), json!(5));
        params.insert("record_types".into(), json!(["vm", "disk"]));
        let PluginInstance::Cloud(mut cloud) = MockCloud::construct(&params).unwrap() else {
            panic!("expected cloud plugin");
        };
        let records: Vec<Record> = cloud.read().map(|r| r.unwrap()).collect().await;
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].raw["record_type"], json!("vm"));
        assert_eq!(records[1].raw["record_type"], json!("disk"));
        assert_eq!(records[2].raw["record_type"], json!("vm"));
        cloud.done().await;
    }
}
