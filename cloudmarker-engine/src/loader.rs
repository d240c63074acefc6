//! Plugin loader.
//!
//! A dynamic language might resolve a dotted class path at runtime via
//! an import mechanism. Rust has no equivalent, so the loader is a
//! registry: each concrete plugin type registers a constructor under
//! its class string, and `load()` looks that string up and calls the
//! constructor with the descriptor's parameters. This keeps the
//! descriptor shape — `{class, params}` — and its error taxonomy
//! stable while making "class resolution" a `HashMap` lookup instead of
//! an import.

use crate::error::PluginError;
use crate::plugin::PluginInstance;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A `{class, params}` pair naming a plugin and its constructor
/// arguments, exactly as it appears under a configuration's `plugins`
/// map.
#[derive(Debug, Clone, Default)]
pub struct PluginDescriptor {
    pub class: String,
    pub params: Map<String, Value>,
}

type Constructor = Box<dyn Fn(&Map<String, Value>) -> Result<PluginInstance, String> + Send + Sync>;

/// Maps plugin class strings to constructors. Populated once at
/// startup with every plugin the binary ships; each plugin's recognized
/// options become its own constructor's parameter parsing.
#[derive(Default)]
pub struct PluginRegistry {
    constructors: HashMap<String, Constructor>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under a dotted class path, e.g.
    /// `"cloudmarker.clouds.mockcloud.MockCloud"`.
    pub fn register<F>(&mut self, class: &str, ctor: F)
    where
        F: Fn(&Map<String, Value>) -> Result<PluginInstance, String> + Send + Sync + 'static,
    {
        self.constructors.insert(class.to_string(), Box::new(ctor));
    }

    /// Instantiate the plugin named by `descriptor`.
    pub fn load(&self, descriptor: &PluginDescriptor) -> Result<PluginInstance, PluginError> {
        if !descriptor.class.contains('.') {
            return Err(PluginError::Misconfigured(descriptor.class.clone()));
        }

        let ctor = self
            .constructors
            .get(&descriptor.class)
            .ok_or_else(|| PluginError::Unresolvable(descriptor.class.clone()))?;

        ctor(&descriptor.params).map_err(|message| PluginError::Construction {
            class: descriptor.class.clone(),
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{CloudReader, RecordStream};
    use crate::record::Record;
    use async_trait::async_trait;
    use futures::stream;
    use serde_json::json;

    /// A mock plugin that reports the parameters it was constructed
    /// with in the single record it reads, so tests can observe
    /// construction without downcasting the trait object.
    struct MockPlugin {
        a: i64,
        b: i64,
    }

    #[async_trait]
    impl CloudReader for MockPlugin {
        fn read(&mut self) -> RecordStream {
            let mut record = Record::default();
            record.raw.insert("a".into(), json!(self.a));
            record.raw.insert("b".into(), json!(self.b));
            Box::pin(stream::iter(vec![Ok(record)]))
        }
        async fn done(&mut self) {}
    }

    fn register_mock(registry: &mut PluginRegistry) {
        registry.register("pkg.mod.MockPlugin", |params| {
            let a = params.get("a").and_then(Value::as_i64).unwrap_or(1);
            let b = params.get("b").and_then(Value::as_i64).unwrap_or(2);
            Ok(PluginInstance::Cloud(Box::new(MockPlugin { a, b })))
        });
    }

    async fn read_one(mut reader: Box<dyn CloudReader>) -> Record {
        use futures::StreamExt;
        reader.read().next().await.unwrap().unwrap()
    }

    #[test]
    fn class_without_separator_is_misconfigured() {
        let registry = PluginRegistry::new();
        let desc = PluginDescriptor {
            class: "foo".to_string(),
            params: Map::new(),
        };
        assert!(matches!(
            registry.load(&desc),
            Err(PluginError::Misconfigured(_))
        ));
    }

    #[test]
    fn unregistered_class_is_unresolvable() {
        let registry = PluginRegistry::new();
        let desc = PluginDescriptor {
            class: "pkg.mod.Missing".to_string(),
            params: Map::new(),
        };
        assert!(matches!(
            registry.load(&desc),
            Err(PluginError::Unresolvable(_))
        ));
    }

    #[tokio::test]
    async fn loads_with_default_params() {
        let mut registry = PluginRegistry::new();
        register_mock(&mut registry);
        let desc = PluginDescriptor {
            class: "pkg.mod.MockPlugin".to_string(),
            params: Map::new(),
        };
        match registry.load(&desc).unwrap() {
            PluginInstance::Cloud(p) => {
                let record = read_one(p).await;
                assert_eq!(record.raw["a"], json!(1));
                assert_eq!(record.raw["b"], json!(2));
            }
            _ => panic!("expected cloud plugin"),
        }
    }

    #[tokio::test]
    async fn loads_with_explicit_params() {
        let mut registry = PluginRegistry::new();
        register_mock(&mut registry);
        let mut params = Map::new();
        params.insert("a".into(), Value::from(3));
        params.insert("b".into(), Value::from(4));
        let desc = PluginDescriptor {
            class: "pkg.mod.MockPlugin".to_string(),
            params,
        };
        match registry.load(&desc).unwrap() {
            PluginInstance::Cloud(p) => {
                let record = read_one(p).await;
                assert_eq!(record.raw["a"], json!(3));
                assert_eq!(record.raw["b"], json!(4));
            }
            _ => panic!("expected cloud plugin"),
        }
    }
}
