pub mod dump;
pub mod job;

pub use dump::DumpProducer;
pub use job::{BackupOrchestrator, RunReport, RunState};
