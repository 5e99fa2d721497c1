pub mod cpu;
pub mod decoder;
pub mod host_interface;
pub mod instruction;
pub mod memory;
pub mod registers;

pub use cpu::Cpu;
pub use host_interface::{Host, InterruptPort, MemoryPort, TracePort};
pub use memory::Memory;
pub use registers::Registers;
