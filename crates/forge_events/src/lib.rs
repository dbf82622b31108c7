//! # forge_events
//!
//! Live event channel for AppForge pipeline progress.
//!
//! Events are a transport artifact, not a system of record: publishing
//! is fire-and-forget, subscribers receive only events published after
//! they subscribe, and a missed event never corrupts pipeline state
//! (the authoritative stage lives in the pipeline run record).

pub mod bus;
pub mod event;

pub use bus::{EventBus, EventSink, NullSink};
pub use event::{EventType, ProgressEvent};
