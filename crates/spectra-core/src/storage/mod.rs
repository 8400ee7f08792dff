pub mod log;
pub mod store;

pub use log::{parse_event_log, read_edge_log, read_event_log, write_edge_log, write_event_log};
pub use store::{EventFilter, TraceStore};
