//! Stage timestamp logging and offline latency correlation.

pub mod correlator;
pub mod event_log;
pub mod recorder;
