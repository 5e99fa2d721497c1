//! Terminal front end for the simulated operating system.

pub mod console;
pub mod logger;
pub mod shell;

pub use console::TerminalConsole;
pub use shell::{Outcome, Shell};
