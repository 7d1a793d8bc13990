//! Command execution for Gantry jobs.

pub mod runner;
pub mod shell;

pub use runner::{OutputLine, OutputStream, RunnerConfig};
pub use shell::ShellRunner;
