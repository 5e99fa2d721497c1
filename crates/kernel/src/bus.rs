use types::{irq, FaultKind, Irq};
use vm::{InterruptPort, MemoryPort, TracePort};

use crate::error::MmuError;
use crate::interrupt::{Interrupt, InterruptQueue, Param};
use crate::mmu::{BackingStore, Mmu};
use crate::pcb::Pcb;

/// The CPU's view of the machine while one process runs.
///
/// Memory accesses go through the MMU under the running process's page
/// table, interrupts land on the kernel's queue. A memory violation is
/// reported once per cycle as SW_FATAL. Any other MMU failure is kept in
/// `fault` for the kernel to trap on after the cycle.
pub(crate) struct CpuBus<'a> {
    pub pcb: &'a Pcb,
    pub mmu: &'a mut Mmu,
    pub backing: &'a mut dyn BackingStore,
    pub interrupts: &'a mut InterruptQueue,
    pub trace: bool,
    pub violated: bool,
    pub fault: Option<MmuError>,
}

impl<'a> CpuBus<'a> {
    pub fn new(
        pcb: &'a Pcb,
        mmu: &'a mut Mmu,
        backing: &'a mut dyn BackingStore,
        interrupts: &'a mut InterruptQueue,
        trace: bool,
    ) -> Self {
        Self {
            pcb,
            mmu,
            backing,
            interrupts,
            trace,
            violated: false,
            fault: None,
        }
    }

    fn record(&mut self, err: MmuError) {
        match err {
            MmuError::Violation(pid) => {
                if !self.violated {
                    self.violated = true;
                    self.interrupts.enqueue(Interrupt::fatal(FaultKind::MemoryViolation, pid));
                }
            }
            other => {
                if self.fault.is_none() {
                    self.fault = Some(other);
                }
            }
        }
    }
}

impl MemoryPort for CpuBus<'_> {
    fn read(&mut self, addr: u16) -> u8 {
        match self.mmu.read(self.pcb, addr, self.backing) {
            Ok(value) => value,
            Err(err) => {
                self.record(err);
                0
            }
        }
    }

    fn write(&mut self, addr: u16, value: u8) {
        if let Err(err) = self.mmu.write(self.pcb, addr, value, self.backing) {
            self.record(err);
        }
    }
}

impl InterruptPort for CpuBus<'_> {
    fn raise(&mut self, irq: Irq, args: &[i64]) {
        let mut params: Vec<Param> = args.iter().copied().map(Param::Int).collect();
        if irq == irq::SW_FATAL {
            params.push(Param::Int(self.pcb.pid as i64));
        }
        self.interrupts.enqueue(Interrupt::new(irq, params));
    }
}

impl TracePort for CpuBus<'_> {
    fn trace(&mut self, message: &str) {
        if self.trace {
            log::debug!("[pid {}] {}", self.pcb.pid, message);
        }
    }
}
