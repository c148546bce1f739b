//! interact.trace.v1 interaction traces
//!
//! A trace is a time-ordered stream of page events (layout changes, pointer
//! and scroll interactions, transport readiness, unload) that drives an engine
//! outside a browser. Traces are stored as NDJSON, one event per line.

mod adapter;
mod event;
mod replay;

pub use adapter::*;
pub use event::*;
pub use replay::*;
