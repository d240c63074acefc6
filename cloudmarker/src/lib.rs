//! Ambient stack around `cloudmarker-engine`: configuration loading,
//! logging initialization, the wall-clock scheduler, the SMTP notifier,
//! and the sample plugin set that makes the engine exercisable without
//! live cloud credentials.

pub mod config;
pub mod logging;
pub mod notify;
pub mod plugins;
pub mod scheduler;
