//! Running compiled artifacts.
//!
//! [`ProcessSupervisor`] owns at most one child and streams its output;
//! [`kill_by_name`] cleans up processes left over from earlier sessions.

mod kill;
mod supervisor;

pub use kill::{KillOutcome, KillStatus, kill_by_name};
pub use supervisor::{ProcessEvent, ProcessEvents, ProcessSupervisor, READER_GRACE};
