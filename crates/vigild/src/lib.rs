//! vigild: conversational machine-health investigator.
//!
//! Two halves: the event query engine (backward scan over named logs with
//! filters and early-termination heuristics) and the intent-driven
//! orchestrator (classify a conversation turn into an action plan,
//! dispatch it to the right tool, synthesize the answer). Shared data
//! types live in `vigil-shared`.

pub mod config;
pub mod dispatch;
pub mod log_source;
pub mod planner;
pub mod prompts;
pub mod query;
pub mod reasoning;
pub mod session;
pub mod synthesize;
pub mod telemetry;

pub use config::VigilConfig;
pub use dispatch::{DispatchOutcome, Toolbox};
pub use log_source::{FakeLogSource, JsonlLogStore, LogCursor, LogSource, RawEvent};
pub use query::EventQueryEngine;
pub use reasoning::{CompletionOptions, FakeReasoning, OllamaClient, ReasoningService};
pub use session::InvestigationSession;
pub use telemetry::{
    FakeTelemetry, MemoryStats, PortBinding, ProcessStat, SystemTelemetry, TelemetryProvider,
};
