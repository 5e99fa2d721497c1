#![no_std]

pub mod config;
pub use config::Config;

pub mod irq;
pub use irq::Irq;

pub mod process;
pub use process::{Pid, Priority, ProcessState};

pub mod fault;
pub use fault::FaultKind;
