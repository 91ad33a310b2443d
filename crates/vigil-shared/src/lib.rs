//! Shared data model for Vigil.
//!
//! Everything the engine, the orchestrator and presentation front-ends
//! exchange lives here: event records and query filters, the action-plan
//! schema with its strict parser, the conversation transcript, and the
//! error taxonomy.

pub mod error;
pub mod event;
pub mod explain;
pub mod plan;
pub mod transcript;

pub use error::VigilError;
pub use event::{EventRecord, QueryFilter, Severity};
pub use explain::{Explanation, ExplanationCache};
pub use plan::{ActionPlan, SearchParams};
pub use transcript::{ConversationTurn, Role, Transcript, RECENT_TURN_WINDOW};

/// Convenience alias used across the workspace.
pub type Result<T> = std::result::Result<T, VigilError>;
