//! Interact - client-side engagement telemetry engine
//!
//! Interact observes how a visitor engages with a page and periodically emits
//! a compact record of that engagement: time spent, which sections held the
//! visitor's attention and for how long, plus a one-time environment snapshot.
//!
//! ## Modules
//!
//! - **Activity**: active/inactive state machine driven by pointer and scroll input
//! - **Measurement modules**: elapsed engaged time and per-section dwell time
//! - **Scheduler**: throttled emission of the accumulated record
//! - **Trace**: replay of recorded interaction traces (`interact.trace.v1`)
//!
//! The engine never reads a clock. Every operation takes the current page
//! time in milliseconds, and [`Engine::advance_to`] fires the recurring timers
//! that fell due in between.

pub mod activity;
pub mod config;
pub mod engine;
pub mod environment;
pub mod error;
pub mod geometry;
pub mod identity;
pub mod modules;
pub mod page;
pub mod record;
pub mod scheduler;
pub mod timer;
pub mod trace;
pub mod transport;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use activity::{ActivityMonitor, ActivityState, Interaction};
pub use config::{DwellOnInactive, EngineConfig, ModuleKind};
pub use engine::{Engine, EnginePhase};
pub use error::TelemetryError;
pub use geometry::{percent_visible, ElementBounds, Viewport};
pub use modules::{MeasurementModule, Module};
pub use page::{Page, PageSnapshot, SectionElement};
pub use record::{OutgoingRecord, SectionReport};
pub use timer::Millis;

// Trace exports
pub use trace::{TraceAdapter, TraceEvent, TraceReplayer, SCHEMA_VERSION};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "interact-telemetry";
