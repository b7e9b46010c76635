//! Shared plumbing for voiceassist crates: tracing setup, process-wide
//! configuration, and function timing.

pub mod config;
pub mod timing;
pub mod tracing;

pub use config::{AppConfig, ConfigError};
pub use timing::{
    round_duration, wrap_async, wrap_async_fallible, wrap_sync, wrap_sync_fallible, BoxFuture,
    TimingInstrument, TimingSink, TracingSink,
};
pub use crate::tracing::{init_tracing, TracingConfig, TracingError, TracingOutputFormat};
