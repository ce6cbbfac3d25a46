//! Task Lifecycle (spec §4.10): durable async execution for edits submitted
//! off-line or retried after failure — submit, pickup, execute, timeout
//! monitoring, and cooperative cancellation over the `Task` records in
//! `StoreAdapter`.
//!
//! Grounded on the teacher's `task_scheduler/{scheduler,executor,monitor}.rs`
//! trio: same one-file-per-responsibility split and the same
//! pending→running→completed|failed state machine shape, generalized here
//! from one-shot sprint-task dispatch to the submit/pickup/execute/sweep
//! lifecycle spec §4.10 describes, and routed through this crate's
//! `AgentRegistry` rather than a fixed sprint `AgentType` enum.

mod executor;
mod monitor;
mod scheduler;

pub use executor::TaskExecutor;
pub use monitor::TaskMonitor;
pub use scheduler::TaskScheduler;
