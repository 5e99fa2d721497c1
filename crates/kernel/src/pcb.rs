use std::fmt;

use types::{Config, Pid, Priority, ProcessState};
use vm::{Cpu, Registers};

use crate::mmu::PageId;

/// Process control block.
///
/// `page_list` and `mem_limit` belong to the MMU; the kernel and scheduler
/// own everything else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pcb {
    pub pid: Pid,
    pub state: ProcessState,
    pub regs: Registers,
    pub mem_limit: usize,
    pub page_list: Vec<PageId>,
    pub priority: Priority,
}

impl Pcb {
    pub fn new(pid: Pid, priority: Option<Priority>) -> Self {
        Self {
            pid,
            state: ProcessState::New,
            regs: Registers::default(),
            mem_limit: 0,
            page_list: Vec::new(),
            priority: priority.unwrap_or(Config::DEFAULT_PRIORITY),
        }
    }

    /// Write `code` byte by byte through `loader` starting at address 0,
    /// then mark the process ready.
    pub fn init<E, F>(&mut self, code: &[u8], mut loader: F) -> Result<(), E>
    where
        F: FnMut(&Pcb, u16, u8) -> Result<(), E>,
    {
        for (addr, byte) in code.iter().enumerate() {
            loader(self, addr as u16, *byte)?;
        }
        self.state = ProcessState::Ready;
        Ok(())
    }

    pub fn zero_registers(&mut self) {
        self.regs.clear();
    }

    /// Pull the live CPU registers into the PCB (switch out).
    pub fn synchronize(&mut self, cpu: &Cpu) {
        self.regs = cpu.regs;
    }

    /// Push the PCB registers into the CPU (switch in).
    pub fn load(&self, cpu: &mut Cpu) {
        cpu.regs = self.regs;
    }
}

impl fmt::Display for Pcb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  PID: {}", self.pid)?;
        writeln!(f, "  PC: {}", self.regs.pc)?;
        writeln!(f, "  ACC: {}", self.regs.acc)?;
        writeln!(f, "  Xreg: {}", self.regs.x)?;
        writeln!(f, "  Yreg: {}", self.regs.y)?;
        writeln!(f, "  Zflag: {}", self.regs.z)?;
        writeln!(f, "  state: {}", self.state)?;
        writeln!(f, "  priority: {}", self.priority)?;
        write!(f, "  Mem allocd: {}", self.mem_limit)
    }
}
