#![deny(missing_docs)]
//! Process wiring for the market pulse orchestration pipeline: loads
//! configuration from the environment, constructs the immutable process-wide
//! singletons (tool registry, fake model gateway, response cache, concrete
//! agents), and assembles them into a runnable [`pulse_orchestrator::Orchestrator`].
//!
//! HTTP transport is a non-goal (see `spec.md` §1); this crate's `main.rs`
//! instead runs one orchestration end to end and prints the resulting
//! report as JSON, which is enough to exercise every module in the
//! workspace without a server underneath it.

pub mod config;
pub mod wiring;

pub use config::{AgentTimeouts, Config};
pub use wiring::{build, Singletons};

/// Initialize the global tracing subscriber from `config`, honoring
/// `RUST_LOG` when set and falling back to `config.log_level`. A no-op
/// (off) filter is installed when tracing is disabled, rather than skipping
/// subscriber installation, so downstream `tracing` calls never panic for
/// lack of a global default.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::filter::{EnvFilter, LevelFilter};
    use tracing_subscriber::prelude::*;

    if !config.tracing_enabled {
        let _ = tracing_subscriber::registry().with(LevelFilter::OFF).try_init();
        return;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let _ = tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_target(false)).with(filter).try_init();
}
