//! Interrupt-driven kernel for the simulated machine.
//!
//! The `Kernel` owns every subsystem: CPU, MMU (and through it physical
//! memory), the file system driver (and through it the disk), the scheduler
//! and the process table. A host calls `Kernel::on_clock_pulse` once per
//! tick; everything else happens inside that call.

mod bus;
pub mod console;
pub mod driver;
pub mod error;
pub mod fs;
pub mod interrupt;
pub mod kernel;
pub mod mmu;
pub mod pcb;
pub mod scheduler;
pub mod vector;

pub use console::{BufferConsole, Console, LineBuffer};
pub use driver::{DeviceDriver, DisplayDriver, KeyboardDriver};
pub use error::{DriverError, FsError, KernelError, MmuError};
pub use fs::FileSystemDriver;
pub use interrupt::{Interrupt, InterruptQueue, Param, TimedAction, TimedEvents};
pub use kernel::{Kernel, KernelConfig};
pub use mmu::{BackingStore, Mmu, PageId};
pub use pcb::Pcb;
pub use scheduler::{Mode, ReadyQueues, Scheduler};
pub use vector::{InterruptHandler, InterruptVector};
