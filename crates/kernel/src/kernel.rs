use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use storage::Disk;
use types::{irq, Config, FaultKind, Irq, Pid, Priority, ProcessState};
use vm::Cpu;

use crate::bus::CpuBus;
use crate::console::Console;
use crate::driver::{DeviceDriver, DisplayDriver, KeyboardDriver};
use crate::error::{FsError, KernelError, MmuError};
use crate::fs::FileSystemDriver;
use crate::interrupt::{Interrupt, InterruptQueue, Param, TimedAction, TimedEvents};
use crate::mmu::Mmu;
use crate::pcb::Pcb;
use crate::scheduler::{Mode, ReadyQueues, Scheduler};
use crate::vector::InterruptVector;

/// Runtime options chosen when the kernel boots.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    pub quantum: u32,
    pub mode: Mode,
    pub trace: bool,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            quantum: Config::DEFAULT_QUANTUM,
            mode: Mode::default(),
            trace: false,
        }
    }
}

/// The operating system kernel.
///
/// EDUCATIONAL PURPOSE: This struct is the single owner of the whole
/// simulated machine:
/// - CPU: registers, execution flag and the quantum countdown timer
/// - MMU: physical memory, page tables and swap bookkeeping
/// - File system driver: the disk, its directory and the swap pages
/// - Scheduler and ready queues: who runs next
/// - Process table: every resident PCB
///
/// EXECUTION MODEL: Nothing runs on its own. A host calls `on_clock_pulse`
/// once per tick and the kernel does exactly one unit of work: dispatch one
/// interrupt, promote one expired timed event, run one CPU cycle, or idle.
/// Interrupts are therefore never interleaved with instructions.
///
/// HALTING: `trap_error` covers conditions the kernel cannot recover from
/// (unknown IRQ, broken disk structure, explicit crash). After a trap every
/// pulse is a no-op.
pub struct Kernel {
    cpu: Cpu,
    mmu: Mmu,
    fs: FileSystemDriver,
    keyboard: KeyboardDriver,
    display: DisplayDriver,

    scheduler: Scheduler,
    ready: ReadyQueues,
    processes: BTreeMap<Pid, Pcb>,
    active: Option<Pid>,
    next_pid: Pid,

    interrupts: InterruptQueue,
    timed: TimedEvents,
    vector: InterruptVector,

    console: Box<dyn Console>,

    clock: u64,
    cycles: u64,
    context_switches: u64,
    trace: bool,
    stepping: bool,
    halted: Option<String>,

    /// Final snapshots of processes that finished or failed.
    terminated: Vec<Pcb>,
    input_lines: VecDeque<String>,
}

impl Kernel {
    /// Build the kernel on `disk` and load its drivers.
    pub fn new(config: KernelConfig, disk: Disk, console: Box<dyn Console>) -> Self {
        let mut cpu = Cpu::new();
        cpu.verbose = config.trace;

        let mut kernel = Self {
            cpu,
            mmu: Mmu::default(),
            fs: FileSystemDriver::new(disk),
            keyboard: KeyboardDriver::new(),
            display: DisplayDriver::new(),
            scheduler: Scheduler::new(config.mode, config.quantum),
            ready: ReadyQueues::new(),
            processes: BTreeMap::new(),
            active: None,
            next_pid: 0,
            interrupts: InterruptQueue::default(),
            timed: TimedEvents::default(),
            vector: InterruptVector::new(),
            console,
            clock: 0,
            cycles: 0,
            context_switches: 0,
            trace: config.trace,
            stepping: false,
            halted: None,
            terminated: Vec::new(),
            input_lines: VecDeque::new(),
        };
        kernel.bootstrap();
        kernel
    }

    fn bootstrap(&mut self) {
        log::info!("{} version {} bootstrap", Config::NAME, Config::VERSION);

        self.vector.register(irq::TIMER, Arc::new(Kernel::timer_isr));
        self.vector.register(irq::KEYBOARD, Arc::new(Kernel::keyboard_isr));
        self.vector.register(irq::DISPLAY, Arc::new(Kernel::display_isr));
        self.vector.register(irq::SYS_CALL, Arc::new(Kernel::syscall_isr));
        self.vector.register(irq::SW_FATAL, Arc::new(Kernel::sw_fatal_isr));
        self.vector.register(irq::PROG_EXIT, Arc::new(Kernel::prog_exit_isr));
        self.vector.register(irq::PROG_STEP, Arc::new(Kernel::prog_step_isr));
        self.vector.register(irq::CPU_TIMER, Arc::new(Kernel::cpu_timer_isr));
        self.vector.register(irq::CONTEXT_SWITCH, Arc::new(Kernel::context_switch_isr));

        log::info!("loading the keyboard device driver");
        if let Err(err) = self.keyboard.driver_entry() {
            self.trap_error(&format!("keyboard driver: {}", err));
            return;
        }
        log::info!("keyboard driver {}", self.keyboard.status());

        log::info!("loading the display device driver");
        if let Err(err) = self.display.driver_entry() {
            self.trap_error(&format!("display driver: {}", err));
            return;
        }
        log::info!("display driver {}", self.display.status());

        log::info!("loading the file system driver");
        if let Err(err) = self.fs.driver_entry() {
            self.trap_error(&format!("file system driver: {}", err));
            return;
        }
        log::info!(
            "file system driver {}, {} files",
            self.fs.status(),
            self.fs.list_files().len()
        );
    }

    // ---------------------------------------------------------------------
    // Clock
    // ---------------------------------------------------------------------

    /// One hardware clock pulse.
    pub fn on_clock_pulse(&mut self) {
        if self.halted.is_some() {
            return;
        }
        self.clock += 1;
        self.timed.advance(1);

        if let Some(interrupt) = self.interrupts.dequeue() {
            self.dispatch(interrupt);
        } else if let Some(interrupt) = self.timed.pop_expired() {
            // Handled on a later pulse like any other interrupt.
            self.interrupts.enqueue(interrupt);
        } else if self.cpu.is_executing && !self.stepping {
            self.run_cycle();
        } else if self.trace && self.clock % Config::IDLE_TRACE_EVERY == 0 {
            log::trace!("idle");
        }
    }

    fn dispatch(&mut self, interrupt: Interrupt) {
        if self.trace {
            log::debug!("handling IRQ {} ({})", interrupt.irq, irq::name(interrupt.irq));
        }
        match self.vector.handler(interrupt.irq) {
            Some(handler) => handler(self, interrupt.params),
            None => self.trap_error(&format!("invalid interrupt {}", interrupt.irq)),
        }
    }

    /// Run one CPU cycle for the active process.
    fn run_cycle(&mut self) {
        let Some(pid) = self.active else {
            self.cpu.is_executing = false;
            return;
        };
        let Some(pcb) = self.processes.get(&pid) else {
            self.cpu.is_executing = false;
            return;
        };

        let mut bus = CpuBus::new(pcb, &mut self.mmu, &mut self.fs, &mut self.interrupts, self.trace);
        self.cpu.cycle(&mut bus);
        let violated = bus.violated;
        let fault = bus.fault.take();

        self.cycles += 1;
        if violated {
            self.cpu.is_executing = false;
        }
        if let Some(err) = fault {
            self.trap_error(&format!("memory unit failure: {}", err));
        }
    }

    pub fn queue_interrupt(&mut self, irq: Irq, params: Vec<Param>) {
        self.interrupts.enqueue(Interrupt::new(irq, params));
    }

    /// Run `action` as a TIMER interrupt after `ticks` pulses.
    pub fn add_timed_event(&mut self, action: TimedAction, ticks: i64) {
        self.timed
            .push(Interrupt::new(irq::TIMER, vec![Param::Action(action)]), ticks);
    }

    // ---------------------------------------------------------------------
    // Interrupt service routines
    // ---------------------------------------------------------------------

    fn timer_isr(&mut self, params: Vec<Param>) {
        for param in params {
            if let Param::Action(action) = param {
                action(self);
            }
        }
    }

    fn keyboard_isr(&mut self, params: Vec<Param>) {
        if let Err(err) = self.keyboard.isr(&params, self.console.as_mut()) {
            self.trap_error(&format!("keyboard: {}", err));
            return;
        }
        while let Some(line) = self.console.flush_input() {
            self.input_lines.push_back(line);
        }
    }

    fn display_isr(&mut self, params: Vec<Param>) {
        if let Err(err) = self.display.isr(&params, self.console.as_mut()) {
            self.trap_error(&format!("display: {}", err));
        }
    }

    fn syscall_isr(&mut self, _params: Vec<Param>) {
        let Some(pid) = self.active else {
            return;
        };
        match self.cpu.regs.x {
            1 => {
                let value = self.cpu.regs.y;
                self.console.put_text(&value.to_string());
            }
            2 => match self.read_string(pid, self.cpu.regs.y) {
                Ok(text) => self.console.put_text(&text),
                Err(MmuError::Violation(pid)) => {
                    self.interrupts
                        .enqueue(Interrupt::fatal(FaultKind::MemoryViolation, pid));
                }
                Err(err) => self.trap_error(&format!("memory unit failure: {}", err)),
            },
            _ => {
                self.interrupts
                    .enqueue(Interrupt::fatal(FaultKind::BadSyscall, pid));
            }
        }
    }

    /// NUL-terminated string at `start` in the address space of `pid`.
    fn read_string(&mut self, pid: Pid, start: u8) -> Result<String, MmuError> {
        let pcb = self.processes.get(&pid).ok_or(MmuError::Violation(pid))?;
        let mut text = String::new();
        let mut addr = start as u16;
        loop {
            let byte = self.mmu.read(pcb, addr, &mut self.fs)?;
            if byte == 0 {
                return Ok(text);
            }
            text.push(byte as char);
            addr += 1;
        }
    }

    /// params: [fault code, pid]
    fn sw_fatal_isr(&mut self, params: Vec<Param>) {
        let reason = params
            .first()
            .and_then(Param::as_int)
            .and_then(FaultKind::from_code);
        let pid = params
            .get(1)
            .and_then(Param::as_int)
            .map(|pid| pid as Pid)
            .or(self.active);
        let Some(pid) = pid else {
            return;
        };
        let reason = reason.map_or_else(|| "unknown".to_string(), |r| r.to_string());

        if self.active == Some(pid) {
            self.cpu.is_executing = false;
        }
        let Some(pcb) = self.processes.get_mut(&pid) else {
            log::debug!("fatal exception for process {} that is no longer resident", pid);
            return;
        };
        if self.active == Some(pid) {
            pcb.synchronize(&self.cpu);
        }
        pcb.state = ProcessState::Failed;
        let snapshot = pcb.clone();

        log::info!("process {} failed: {}", pid, reason);
        self.print_line(&format!("process {} fatal exception: {}", pid, reason));
        self.print_pcb(&snapshot);
        self.terminated.push(snapshot);
        if let Err(err) = self.free_process(pid) {
            log::debug!("release of process {} failed: {}", pid, err);
        }
    }

    fn prog_exit_isr(&mut self, _params: Vec<Param>) {
        let Some(pid) = self.active else {
            return;
        };
        let Some(pcb) = self.processes.get_mut(&pid) else {
            return;
        };
        pcb.synchronize(&self.cpu);
        pcb.state = ProcessState::Done;
        let snapshot = pcb.clone();

        log::info!("process {} complete", pid);
        self.print_line(&format!("Program: {} - Complete", pid));
        self.print_line("PCB:");
        self.print_pcb(&snapshot);
        self.terminated.push(snapshot);
        if let Err(err) = self.free_process(pid) {
            log::debug!("release of process {} failed: {}", pid, err);
        }
    }

    fn prog_step_isr(&mut self, _params: Vec<Param>) {
        if self.stepping && self.active.is_some() {
            self.run_cycle();
        }
    }

    fn cpu_timer_isr(&mut self, _params: Vec<Param>) {
        self.schedule();
    }

    /// params: [incoming pid]
    fn context_switch_isr(&mut self, params: Vec<Param>) {
        let Some(pid) = params.first().and_then(Param::as_int).map(|p| p as Pid) else {
            log::error!("context switch without a pid");
            return;
        };
        if !self.processes.contains_key(&pid) {
            log::debug!("context switch to process {} ignored, no longer resident", pid);
            return;
        }

        if let Some(current) = self.active.take() {
            if current != pid {
                self.preempt(current);
            }
        }

        self.ready.remove(pid);
        if let Some(pcb) = self.processes.get_mut(&pid) {
            pcb.load(&mut self.cpu);
            pcb.state = ProcessState::Running;
        }
        if self.trace {
            log::debug!("context switch to process {}", pid);
        }
        self.active = Some(pid);
        self.cpu.is_executing = true;
        self.stepping = false;
        self.context_switches += 1;
    }

    /// Save the CPU into a switched-out process and put it back on the ready queues.
    fn preempt(&mut self, pid: Pid) {
        if let Some(pcb) = self.processes.get_mut(&pid) {
            pcb.synchronize(&self.cpu);
            pcb.state = ProcessState::Ready;
            self.ready.push(pid, pcb.priority);
        }
    }

    /// Ask the scheduler for the next process, switching to it if any.
    fn schedule(&mut self) {
        if let Some(pid) = self.scheduler.decide(&mut self.ready, &mut self.cpu) {
            self.queue_interrupt(irq::CONTEXT_SWITCH, vec![Param::Int(pid as i64)]);
        }
    }

    // ---------------------------------------------------------------------
    // Processes
    // ---------------------------------------------------------------------

    /// Create a process with `size` bytes of memory, or the full ceiling
    /// when `size` is None. On failure no PCB is registered.
    pub fn allocate_program(
        &mut self,
        size: Option<usize>,
        priority: Option<Priority>,
    ) -> Result<Pid, KernelError> {
        let pid = self.next_pid;
        self.next_pid += 1;

        let mut pcb = Pcb::new(pid, priority);
        let bytes = size.unwrap_or(Config::PROGRAM_ALLOWED_MEM);
        self.mmu.allocate_mem(&mut pcb, bytes, &mut self.fs)?;
        if let Err(err) = self.mmu.zero_mem(&pcb, &mut self.fs) {
            self.mmu.free_all(&mut pcb, &mut self.fs)?;
            return Err(err.into());
        }
        pcb.zero_registers();
        log::info!("allocated process {} ({} bytes)", pid, pcb.mem_limit);
        self.processes.insert(pid, pcb);
        Ok(pid)
    }

    /// Allocate a process and copy `code` into it starting at address 0.
    pub fn load_program(
        &mut self,
        code: &[u8],
        priority: Option<Priority>,
    ) -> Result<Pid, KernelError> {
        if code.len() > Config::PROGRAM_ALLOWED_MEM {
            return Err(KernelError::ProgramTooLarge(code.len()));
        }
        let pid = self.allocate_program(None, priority)?;

        let Kernel {
            processes, mmu, fs, ..
        } = self;
        let result = match processes.get_mut(&pid) {
            Some(pcb) => pcb.init(code, |pcb, addr, byte| mmu.write(pcb, addr, byte, &mut *fs)),
            None => return Err(KernelError::NoSuchProcess(pid)),
        };
        if let Err(err) = result {
            if let Err(free_err) = self.free_process(pid) {
                log::debug!("release of process {} after a failed load: {}", pid, free_err);
            }
            return Err(err.into());
        }
        Ok(pid)
    }

    /// Put a resident process on the ready queues.
    pub fn queue_program(&mut self, pid: Pid) -> Result<(), KernelError> {
        if self.active == Some(pid) {
            return Err(KernelError::Busy(pid));
        }
        let pcb = self
            .processes
            .get_mut(&pid)
            .ok_or(KernelError::NoSuchProcess(pid))?;
        pcb.state = ProcessState::Ready;
        self.ready.push(pid, pcb.priority);
        Ok(())
    }

    /// Make a scheduling decision if nothing is running. A stepped process
    /// leaves step mode and competes with the rest of the ready queue.
    pub fn start_execution(&mut self) {
        if self.stepping {
            self.stepping = false;
            if let Some(current) = self.active.take() {
                self.preempt(current);
            }
        }
        if self.active.is_none() {
            self.schedule();
        }
    }

    /// Release everything a process holds.
    ///
    /// Freeing the active process stops the CPU and asks the scheduler for
    /// a replacement right away.
    pub fn free_process(&mut self, pid: Pid) -> Result<(), KernelError> {
        let Some(mut pcb) = self.processes.remove(&pid) else {
            log::error!("free of process {} failed, no such process", pid);
            return Err(KernelError::NoSuchProcess(pid));
        };
        let freed = self.mmu.free_all(&mut pcb, &mut self.fs);
        self.ready.remove(pid);

        if self.active == Some(pid) {
            self.active = None;
            self.cpu.is_executing = false;
            self.stepping = false;
            self.schedule();
        }

        if let Err(err) = freed {
            self.trap_error(&format!("memory unit failure: {}", err));
            return Err(err.into());
        }
        log::info!("freed process {}", pid);
        Ok(())
    }

    /// Switch `pid` in without running it. Each `step()` then runs one cycle.
    pub fn step_program(&mut self, pid: Pid) -> Result<(), KernelError> {
        if let Some(active) = self.active {
            if active != pid && self.cpu.is_executing {
                return Err(KernelError::Busy(active));
            }
        }
        if !self.processes.contains_key(&pid) {
            return Err(KernelError::NoSuchProcess(pid));
        }
        match self.active.take() {
            Some(current) if current != pid => self.preempt(current),
            Some(current) => {
                if let Some(pcb) = self.processes.get_mut(&current) {
                    pcb.synchronize(&self.cpu);
                }
            }
            None => {}
        }

        let pcb = self
            .processes
            .get_mut(&pid)
            .ok_or(KernelError::NoSuchProcess(pid))?;
        self.ready.remove(pid);
        pcb.load(&mut self.cpu);
        pcb.state = ProcessState::Running;
        self.cpu.disarm_timer();
        self.cpu.is_executing = false;
        self.active = Some(pid);
        self.stepping = true;
        Ok(())
    }

    /// Queue one single-step cycle for the stepped process.
    pub fn step(&mut self) -> bool {
        if self.stepping && self.active.is_some() {
            self.queue_interrupt(irq::PROG_STEP, Vec::new());
            true
        } else {
            false
        }
    }

    pub fn is_stepping(&self) -> bool {
        self.stepping
    }

    // ---------------------------------------------------------------------
    // Files
    // ---------------------------------------------------------------------

    pub fn create_file(&mut self, name: &str) -> Result<(), KernelError> {
        let result = self.fs.create_file(name);
        self.check_fs(result)
    }

    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), KernelError> {
        let result = self.fs.write_file(name, data);
        self.check_fs(result)
    }

    pub fn read_file(&mut self, name: &str) -> Result<Vec<u8>, KernelError> {
        let result = self.fs.read_file(name);
        self.check_fs(result)
    }

    pub fn delete_file(&mut self, name: &str) -> Result<(), KernelError> {
        let result = self.fs.delete_file(name);
        self.check_fs(result)
    }

    pub fn list_files(&self) -> Vec<String> {
        self.fs.list_files()
    }

    /// Format the disk. Refused while processes are resident since their
    /// swap pages live on it.
    pub fn format_disk(&mut self) -> Result<(), KernelError> {
        if !self.processes.is_empty() {
            return Err(KernelError::Resident(self.processes.len()));
        }
        let result = self.fs.format();
        self.check_fs(result)
    }

    /// Structural disk errors halt the kernel; the rest go back to the caller.
    fn check_fs<T>(&mut self, result: Result<T, FsError>) -> Result<T, KernelError> {
        result.map_err(|err| {
            if err.is_fatal() {
                self.trap_error(&format!("file system: {}", err));
            }
            KernelError::Fs(err)
        })
    }

    // ---------------------------------------------------------------------
    // Console and input
    // ---------------------------------------------------------------------

    /// Raise a KEYBOARD interrupt for one key press.
    pub fn key_press(&mut self, code: i64, shifted: bool) {
        self.queue_interrupt(
            irq::KEYBOARD,
            vec![Param::Int(code), Param::Int(shifted as i64)],
        );
    }

    /// Next line completed on the keyboard, if any.
    pub fn take_input_line(&mut self) -> Option<String> {
        self.input_lines.pop_front()
    }

    pub fn print_line(&mut self, text: &str) {
        self.console.put_text(text);
        self.console.advance_line();
    }

    fn print_pcb(&mut self, pcb: &Pcb) {
        for line in pcb.to_string().lines() {
            self.print_line(line);
        }
    }

    /// Halt the machine. Nothing runs after this.
    pub fn trap_error(&mut self, msg: &str) {
        log::error!("OS ERROR - TRAP: {}", msg);
        self.interrupts.clear();
        self.cpu.is_executing = false;
        self.console.bsod(msg);
        self.halted = Some(msg.to_string());
    }

    /// Orderly stop: interrupts are dropped and the CPU halts.
    pub fn shutdown(&mut self) {
        log::info!("begin shutdown");
        self.interrupts.clear();
        self.cpu.is_executing = false;
        self.halted = Some("shutdown".to_string());
        log::info!("end shutdown");
    }

    // ---------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------

    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    pub fn processes(&self) -> impl Iterator<Item = &Pcb> {
        self.processes.values()
    }

    pub fn process(&self, pid: Pid) -> Option<&Pcb> {
        self.processes.get(&pid)
    }

    pub fn ready_pids(&self) -> Vec<Pid> {
        self.ready.pids()
    }

    pub fn ready(&self) -> &ReadyQueues {
        &self.ready
    }

    pub fn active_pid(&self) -> Option<Pid> {
        self.active
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut Scheduler {
        &mut self.scheduler
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn fs(&self) -> &FileSystemDriver {
        &self.fs
    }

    pub fn console(&self) -> &dyn Console {
        self.console.as_ref()
    }

    pub fn console_mut(&mut self) -> &mut dyn Console {
        self.console.as_mut()
    }

    pub fn terminated(&self) -> &[Pcb] {
        &self.terminated
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn context_switches(&self) -> u64 {
        self.context_switches
    }

    pub fn set_trace(&mut self, on: bool) {
        self.trace = on;
        self.cpu.verbose = on;
    }

    pub fn trace_enabled(&self) -> bool {
        self.trace
    }

    pub fn interrupts_pending(&self) -> Vec<Irq> {
        self.interrupts.irqs()
    }

    pub fn timed_len(&self) -> usize {
        self.timed.len()
    }
}
