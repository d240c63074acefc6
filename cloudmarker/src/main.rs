//! `cloudmarker` — cloud security auditing daemon.
//!
//! Wires the embedded base configuration and any `-c` overrides into a
//! [`cloudmarker_engine::supervisor::JobSupervisor`], then either runs
//! the configured audits once (`-n/--now`) or sits in the wall-clock
//! scheduler loop.

use clap::Parser;
use cloudmarker::config::{self, Config};
use cloudmarker::{logging, notify, plugins, scheduler};
use cloudmarker_engine::loader::PluginRegistry;
use cloudmarker_engine::notify::{NullNotifier, Notifier};
use cloudmarker_engine::supervisor::JobSupervisor;
use std::path::PathBuf;

/// Cloud security auditing daemon.
#[derive(Parser)]
#[command(name = "cloudmarker", author, version, about, long_about = None, disable_version_flag = true)]
struct Args {
    /// Configuration file(s) to load, deep-merged in order on top of
    /// the embedded base configuration. If omitted, a fixed search
    /// list of well-known paths is used; missing files are skipped.
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Vec<PathBuf>,

    /// Ignore the configured schedule and run the configured audits
    /// once, immediately.
    #[arg(short = 'n', long = "now")]
    now: bool,

    /// Print the built-in base configuration to standard output and
    /// exit without running anything.
    #[arg(short = 'p', long = "print-base-config")]
    print_base_config: bool,

    /// Print version and exit.
    #[arg(short = 'v', long = "version", action = clap::ArgAction::Version)]
    version: (),
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_base_config {
        print!("{}", config::BASE_CONFIG_YAML);
        return Ok(());
    }

    let paths: Vec<PathBuf> = if args.config.is_empty() {
        Config::default_search_paths().into_iter().map(PathBuf::from).collect()
    } else {
        args.config
    };

    let config = {
        // Give Config::load somewhere to log missing-file warnings
        // before the configured level is known; dropped before the
        // real subscriber is installed below.
        let _early_logging = logging::init_early();
        Config::load(&paths)?
    };
    logging::init(&config.logger);

    let mut registry = PluginRegistry::new();
    plugins::register(&mut registry);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config, &registry, args.now))
}

async fn run(config: Config, registry: &PluginRegistry, now: bool) -> anyhow::Result<()> {
    let audit_version = env!("CARGO_PKG_VERSION");
    let notifier: Box<dyn Notifier> = match config.email.clone() {
        Some(email) => Box::new(notify::EmailNotifier::new(email)),
        None => Box::new(NullNotifier),
    };
    let supervisor = JobSupervisor::new(audit_version, &config.audits, &config.plugins, registry);

    if now {
        supervisor.run_once(&config.run, notifier.as_ref()).await;
        return Ok(());
    }

    let schedule = config
        .schedule
        .clone()
        .ok_or_else(|| anyhow::anyhow!("no `schedule` configured and `-n/--now` was not given"))?;

    loop {
        let wait = scheduler::duration_until_next(&schedule, chrono::Local::now())?;
        tracing::info!(seconds = wait.as_secs(), "sleeping until next scheduled run");
        tokio::time::sleep(wait).await;
        supervisor.run_once(&config.run, notifier.as_ref()).await;
    }
}
