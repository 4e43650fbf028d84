// Best-effort records of model calls and session results
//
// Writes JSONL in the background; failures are logged and otherwise ignored.

pub mod record_log;

pub use record_log::{CallRecord, RecordLog, SessionRecord};
