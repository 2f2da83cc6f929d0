//! Logging setup and operational alerts.

mod alerts;
mod logging;

pub use alerts::{Alert, AlertReason, AlertSink, ChannelAlertSink, CollectingAlertSink, LoggingAlertSink};
pub use logging::{env_filter, init_tracing};
