//! Rust SDK for emitting semantic agent events that Spectra can reconstruct.
//!
//! # Example
//! ```no_run
//! use spectra_sdk::TraceCollector;
//!
//! let mut trace = TraceCollector::new("request-42");
//! trace.goal("planner", "Summarize the quarterly report");
//! trace.delegate("planner", "retriever", "Fetch the report");
//! trace.tool("retriever", "document_search");
//! trace.complete("retriever", Some("3 documents"));
//! trace.reasoning("planner", "Drafting the summary");
//! trace.write_log(std::path::Path::new("events.jsonl")).unwrap();
//! ```

mod collector;

pub use collector::TraceCollector;

// Re-export core types that SDK users may need
pub use spectra_core::model::{AgentId, CorrelationId, Event, EventId, EventKind, Payload};
pub use spectra_core::storage::TraceStore;
