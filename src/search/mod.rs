//! Search orchestration: decomposition, the per-sub-query refine loop and
//! report synthesis.

pub mod decompose;
pub mod engine;
pub mod evaluate;
pub mod events;
pub mod model;
mod parse;
pub mod prompts;
pub mod refine;
pub mod sources;
pub mod summarize;
pub mod synthesize;

pub use engine::{Agent, InitError, Orchestrator, SessionError};
pub use events::{EventSink, EventStream, ReportEvent};
pub use model::{ResearchOutcome, SearchStep, SubQueryStatus};
pub use sources::SourceList;
