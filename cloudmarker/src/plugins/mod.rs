//! Sample plugin set: one plugin per role, none of which talk to a
//! real cloud API, document store, search index, or SMTP server. They
//! exist purely so the engine can be exercised end-to-end without live
//! credentials, and they are what [`register`] wires into a
//! [`PluginRegistry`].

pub mod counting_evaluator;
pub mod file_store;
pub mod log_alert;
pub mod mock_cloud;

use cloudmarker_engine::loader::PluginRegistry;

pub const MOCK_CLOUD_CLASS: &str = "cloudmarker.clouds.mockcloud.MockCloud";
pub const COUNTING_EVALUATOR_CLASS: &str = "cloudmarker.checks.mockcheck.CountingEvaluator";
pub const FILE_STORE_CLASS: &str = "cloudmarker.stores.filestore.FileStore";
pub const LOG_ALERT_CLASS: &str = "cloudmarker.alerts.logalert.LogAlert";

/// Register every sample plugin under its class path.
pub fn register(registry: &mut PluginRegistry) {
    registry.register(MOCK_CLOUD_CLASS, mock_cloud::MockCloud::construct);
    registry.register(COUNTING_EVALUATOR_CLASS, counting_evaluator::CountingEvaluator::construct);
    registry.register(FILE_STORE_CLASS, file_store::FileStore::construct);
    registry.register(LOG_ALERT_CLASS, log_alert::LogAlert::construct);
}
