// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Logging Setup
//!
//! Installs the global `tracing` subscriber: human readable output when running
//! locally, bunyan JSON everywhere else. Noisy dependencies such as `lapin`
//! are capped at WARN unless external crate logging is enabled.

use crate::{configs::AppConfigs, errors::LoggingError};
use tracing::warn;
use tracing_bunyan_formatter::BunyanFormattingLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{
    filter::{LevelFilter, Targets},
    fmt::Layer,
    layer::SubscriberExt,
};

/// Dependencies whose own logging is held at WARN by default.
const NOISY_TARGETS: [&str; 6] = [
    "lapin",
    "amq_protocol",
    "pinky_swear",
    "async_io",
    "polling",
    "log",
];

/// Installs the global subscriber for `cfg`. Fails when another global
/// subscriber was already set.
pub fn setup(cfg: &AppConfigs) -> Result<(), LoggingError> {
    if let Err(err) = LogTracer::init() {
        warn!(
            error = err.to_string(),
            "log records already bridged to tracing"
        );
    }

    let mut targets = Targets::new().with_default(level_filter(&cfg.log_level));
    if !cfg.enable_external_crates_logging {
        targets = targets.with_targets(NOISY_TARGETS.map(|target| (target, LevelFilter::WARN)));
    }

    let local = cfg.env.is_local();
    let pretty = local.then(|| Layer::new().pretty());
    let bunyan = (!local).then(|| BunyanFormattingLayer::new(cfg.name.clone(), std::io::stdout));

    let subscriber = tracing_subscriber::registry()
        .with(bunyan)
        .with(pretty)
        .with(targets);

    match tracing::subscriber::set_global_default(subscriber) {
        Err(err) => {
            warn!(error = err.to_string(), "failure to set tracing subscriber");
            Err(LoggingError::InternalError {})
        }
        _ => Ok(()),
    }
}

/// Case-insensitive level name or 0-5 verbosity; anything else turns logging off.
fn level_filter(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::OFF)
}
