use tracing::level_filters::LevelFilter;
use tracing_subscriber::{Registry, reload};

use crate::prelude::*;

/// Handle to the global log level, switched by the `debug_logging` setting.
pub struct LogLevel(reload::Handle<LevelFilter, Registry>);

impl LogLevel {
    pub const fn new(handle: reload::Handle<LevelFilter, Registry>) -> Self {
        Self(handle)
    }

    pub fn set_debug(&self, is_enabled: bool) {
        let level = if is_enabled { LevelFilter::DEBUG } else { LevelFilter::INFO };
        if let Err(error) = self.0.modify(|filter| *filter = level) {
            warn!("failed to change the log level: {error:#}");
        } else {
            info!(%level, "log level");
        }
    }
}
