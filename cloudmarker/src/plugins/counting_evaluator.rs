//! `CountingEvaluator`: derives one record whenever
//! `raw.record_num % modulus == 0`.

use async_trait::async_trait;
use cloudmarker_engine::plugin::{EventEvaluator, PluginInstance, RecordStream};
use cloudmarker_engine::record::Record;
use futures::stream;
use serde::Deserialize;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Deserialize)]
struct Params {
    #[serde(default = "default_modulus")]
    modulus: u64,
}

fn default_modulus() -> u64 {
    2
}

pub struct CountingEvaluator {
    modulus: u64,
}

impl CountingEvaluator {
    pub fn construct(params: &Map<String, Value>) -> Result<PluginInstance, String> {
        let params: Params =
            serde_json::from_value(Value::Object(params.clone())).map_err(|e| e.to_string())?;
        Ok(PluginInstance::Event(Box::new(CountingEvaluator {
            modulus: params.modulus.max(1),
        })))
    }
}

#[async_trait]
impl EventEvaluator for CountingEvaluator {
    fn eval(&self, record: &Record) -> RecordStream {
        let hits = record
            .raw
            .get("record_num")
            .and_then(Value::as_u64)
            .map(|n| n % self.modulus == 0)
            .unwrap_or(false);

        let derived = if hits {
            let mut r = Record::default();
            r.ext.insert("counted".into(), json!(true));
            vec![Ok(r)]
        } else {
            Vec::new()
        };
        Box::pin(stream::iter(derived))
    }

    async fn done(&mut self) {}
}
