use std::io::{stderr, stdout};

use tracing::Level;
use tracing_subscriber::prelude::*;

use super::*;

/// Install the global subscriber: debug builds log at DEBUG, release at INFO.
#[inline]
pub fn init_logger() {
    init_logger_with_level(if cfg!(debug_assertions) {
        Level::DEBUG
    } else {
        Level::INFO
    });
}

/// Install the global subscriber with an explicit ceiling. Calling it twice is
/// harmless, the second registration is ignored.
pub fn init_logger_with_level(max_level: Level) {
    let writer = stderr
        .with_max_level(Level::WARN)
        .or_else(stdout.with_max_level(max_level));

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .map_writer(move |_| writer)
                .map_event_format(|e| PlaysyncFormatter {
                    default: e.with_timer(LogTime),
                })
                .with_filter(GeneralFilter { max_level }),
        )
        .try_init();
}
