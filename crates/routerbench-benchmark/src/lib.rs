pub mod coordinator;
pub mod events;
pub mod invocation;
pub mod normalizer;
pub mod runner;
pub mod summary;

pub use coordinator::{clean_old_results, collect_results, write_run_summary, RunCoordinator};
pub use events::{EventSink, RunEvent};
pub use invocation::Invocation;
pub use normalizer::{normalize, parse_profile_csv};
pub use runner::{GenAiPerfRunner, InvocationOutcome, Invoker, OutputFilter};
pub use summary::{Completion, SummaryClient};
