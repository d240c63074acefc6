//! End-to-end audit graph scenarios.
//!
//! These drive [`cloudmarker_engine::runner::AuditRunner`] against small
//! in-memory fixture plugins rather than anything that talks to a real
//! cloud, store, search index, or SMTP server.

use async_trait::async_trait;
use cloudmarker_engine::error::PluginError;
use cloudmarker_engine::graph::AuditDescriptor;
use cloudmarker_engine::loader::{PluginDescriptor, PluginRegistry};
use cloudmarker_engine::notify::NullNotifier;
use cloudmarker_engine::plugin::{AlertSink, CloudReader, EventEvaluator, PluginInstance, RecordStream, StoreSink};
use cloudmarker_engine::record::{ControlMarker, OriginType, Record};
use cloudmarker_engine::runner::AuditRunner;
use futures::stream;
use serde_json::{json, Map};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Emits one record `{raw:{data:"x"}}`.
struct OneRecordCloud;

#[async_trait]
impl CloudReader for OneRecordCloud {
    fn read(&mut self) -> RecordStream {
        let mut r = Record::default();
        r.raw.insert("data".into(), json!("x"));
        Box::pin(stream::iter(vec![Ok(r)]))
    }
    async fn done(&mut self) {}
}

/// Derives `[{ext:{len:1}}, {ext:{upper:"X"}}]` for any input.
struct TwoDerivationsEvaluator;

#[async_trait]
impl EventEvaluator for TwoDerivationsEvaluator {
    fn eval(&self, _record: &Record) -> RecordStream {
        let mut d0 = Record::default();
        d0.ext.insert("len".into(), json!(1));
        let mut d1 = Record::default();
        d1.ext.insert("upper".into(), json!("X"));
        Box::pin(stream::iter(vec![Ok(d0), Ok(d1)]))
    }
    async fn done(&mut self) {}
}

#[derive(Clone, Default)]
struct RecordingSink(Arc<Mutex<Vec<Record>>>);

impl RecordingSink {
    fn snapshot(&self) -> Vec<Record> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl StoreSink for RecordingSink {
    async fn write(&mut self, record: Record) -> Result<(), PluginError> {
        self.0.lock().unwrap().push(record);
        Ok(())
    }
    async fn done(&mut self) {}
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn write(&mut self, record: Record) -> Result<(), PluginError> {
        self.0.lock().unwrap().push(record);
        Ok(())
    }
    async fn done(&mut self) {}
}

/// A store whose `write` raises on the second *data* record.
/// Control records (`begin_audit`/`end_audit`) pass through the same
/// `write()` call as data records, so the count that matters is over
/// data records only.
struct FailingStore {
    sink: Arc<Mutex<Vec<Record>>>,
    data_calls: usize,
}

#[async_trait]
impl StoreSink for FailingStore {
    async fn write(&mut self, record: Record) -> Result<(), PluginError> {
        if record.is_control(ControlMarker::BeginAudit) || record.is_control(ControlMarker::EndAudit) {
            return Ok(());
        }
        self.data_calls += 1;
        if self.data_calls == 2 {
            return Err(PluginError::Runtime {
                worker: "failing_store".to_string(),
                method: "write",
                message: "boom".to_string(),
            });
        }
        self.sink.lock().unwrap().push(record);
        Ok(())
    }
    async fn done(&mut self) {}
}

fn descriptor(class: &str) -> PluginDescriptor {
    PluginDescriptor {
        class: class.to_string(),
        params: Map::new(),
    }
}

/// One cloud record, one event evaluator producing two derived
/// records, one alert. The alert sees `begin_audit`, both derived
/// records tagged `origin_type=event`, then `end_audit`.
#[tokio::test]
async fn s2_event_derivations_reach_alert_with_event_origin() {
    let mut registry = PluginRegistry::new();
    registry.register("test.cloud.OneRecordCloud", |_| {
        Ok(PluginInstance::Cloud(Box::new(OneRecordCloud)))
    });
    registry.register("test.event.TwoDerivationsEvaluator", |_| {
        Ok(PluginInstance::Event(Box::new(TwoDerivationsEvaluator)))
    });
    let alert_sink = RecordingSink::default();
    {
        let alert_sink = alert_sink.clone();
        registry.register("test.alert.Recording", move |_| {
            Ok(PluginInstance::Alert(Box::new(alert_sink.clone())))
        });
    }

    let mut plugins = HashMap::new();
    plugins.insert("cloud1".to_string(), descriptor("test.cloud.OneRecordCloud"));
    plugins.insert("event1".to_string(), descriptor("test.event.TwoDerivationsEvaluator"));
    plugins.insert("alert1".to_string(), descriptor("test.alert.Recording"));

    let audit = AuditDescriptor {
        clouds: vec!["cloud1".to_string()],
        events: vec!["event1".to_string()],
        stores: vec![],
        alerts: vec!["alert1".to_string()],
    };

    AuditRunner::new("audit2", "1", &audit, &plugins, &registry)
        .run(&NullNotifier)
        .await
        .unwrap();

    let seen = alert_sink.snapshot();
    assert_eq!(seen.len(), 4);
    assert!(seen[0].is_control(ControlMarker::BeginAudit));
    assert_eq!(seen[1].com.origin_type, Some(OriginType::Event));
    assert_eq!(seen[1].ext.get("len"), Some(&json!(1)));
    assert_eq!(seen[2].com.origin_type, Some(OriginType::Event));
    assert_eq!(seen[2].ext.get("upper"), Some(&json!("X")));
    assert!(seen[3].is_control(ControlMarker::EndAudit));
}

/// Two stores and two alerts, one cloud, one event. Every cloud
/// record reaches both stores; both alerts see identical derived
/// sequences.
#[tokio::test]
async fn s3_fan_out_to_every_attached_sink() {
    let mut registry = PluginRegistry::new();
    registry.register("test.cloud.OneRecordCloud", |_| {
        Ok(PluginInstance::Cloud(Box::new(OneRecordCloud)))
    });
    registry.register("test.event.TwoDerivationsEvaluator", |_| {
        Ok(PluginInstance::Event(Box::new(TwoDerivationsEvaluator)))
    });

    let store_a = RecordingSink::default();
    let store_b = RecordingSink::default();
    let alert_a = RecordingSink::default();
    let alert_b = RecordingSink::default();
    for (name, sink) in [("A", store_a.clone()), ("B", store_b.clone())] {
        registry.register(&format!("test.store.{name}"), move |_| {
            Ok(PluginInstance::Store(Box::new(sink.clone())))
        });
    }
    for (name, sink) in [("A", alert_a.clone()), ("B", alert_b.clone())] {
        registry.register(&format!("test.alert.{name}"), move |_| {
            Ok(PluginInstance::Alert(Box::new(sink.clone())))
        });
    }

    let mut plugins = HashMap::new();
    plugins.insert("cloud1".to_string(), descriptor("test.cloud.OneRecordCloud"));
    plugins.insert("event1".to_string(), descriptor("test.event.TwoDerivationsEvaluator"));
    plugins.insert("storeA".to_string(), descriptor("test.store.A"));
    plugins.insert("storeB".to_string(), descriptor("test.store.B"));
    plugins.insert("alertA".to_string(), descriptor("test.alert.A"));
    plugins.insert("alertB".to_string(), descriptor("test.alert.B"));

    let audit = AuditDescriptor {
        clouds: vec!["cloud1".to_string()],
        events: vec!["event1".to_string()],
        stores: vec!["storeA".to_string(), "storeB".to_string()],
        alerts: vec!["alertA".to_string(), "alertB".to_string()],
    };

    AuditRunner::new("audit3", "1", &audit, &plugins, &registry)
        .run(&NullNotifier)
        .await
        .unwrap();

    let sa = store_a.snapshot();
    let sb = store_b.snapshot();
    assert_eq!(sa.len(), 3); // begin, one cloud record, end
    assert_eq!(sb.len(), 3);
    assert_eq!(sa[1].raw.get("data"), sb[1].raw.get("data"));

    let aa = alert_a.snapshot();
    let ab = alert_b.snapshot();
    assert_eq!(aa.len(), 4); // begin, two derived, end
    assert_eq!(ab.len(), 4);
    assert_eq!(aa[1].ext, ab[1].ext);
    assert_eq!(aa[2].ext, ab[2].ext);
}

/// A store whose `write` raises on the second record. The first
/// and third records are persisted; the run still ends with
/// `end_audit` and `done()`.
#[tokio::test]
async fn s4_failing_write_is_isolated_and_run_still_ends() {
    let mut registry = PluginRegistry::new();
    registry.register("test.cloud.ThreeRecordCloud", |_| {
        struct ThreeRecordCloud;
        #[async_trait]
        impl CloudReader for ThreeRecordCloud {
            fn read(&mut self) -> RecordStream {
                let records = (0..3)
                    .map(|i| {
                        let mut r = Record::default();
                        r.raw.insert("i".into(), json!(i));
                        Ok(r)
                    })
                    .collect::<Vec<_>>();
                Box::pin(stream::iter(records))
            }
            async fn done(&mut self) {}
        }
        Ok(PluginInstance::Cloud(Box::new(ThreeRecordCloud)))
    });

    let persisted = Arc::new(Mutex::new(Vec::new()));
    {
        let persisted = persisted.clone();
        registry.register("test.store.Failing", move |_| {
            Ok(PluginInstance::Store(Box::new(FailingStore {
                sink: persisted.clone(),
                data_calls: 0,
            })))
        });
    }

    let mut plugins = HashMap::new();
    plugins.insert("cloud1".to_string(), descriptor("test.cloud.ThreeRecordCloud"));
    plugins.insert("store1".to_string(), descriptor("test.store.Failing"));

    let audit = AuditDescriptor {
        clouds: vec!["cloud1".to_string()],
        events: vec![],
        stores: vec!["store1".to_string()],
        alerts: vec![],
    };

    AuditRunner::new("audit4", "1", &audit, &plugins, &registry)
        .run(&NullNotifier)
        .await
        .unwrap();

    let kept = persisted.lock().unwrap();
    assert_eq!(kept.len(), 2);
    assert_eq!(kept[0].raw.get("i"), Some(&json!(0)));
    assert_eq!(kept[1].raw.get("i"), Some(&json!(2)));
}
