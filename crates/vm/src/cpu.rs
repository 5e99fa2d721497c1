use crate::decoder::decode;
use crate::host_interface::Host;
use crate::instruction::{Instruction, Opcode};
use crate::registers::Registers;
use types::{irq, Config, FaultKind};

/// Represents the Central Processing Unit (CPU) of the simulated machine.
///
/// EDUCATIONAL PURPOSE: This struct models the parts of a real CPU that a
/// kernel has to care about:
/// - Registers: The program counter, accumulator, X, Y and the zero flag
/// - Execution flag: Whether the processor is currently running a program
/// - Countdown timer: A hardware timer the scheduler arms to enforce quanta
///
/// OWNERSHIP: The CPU owns no memory and no interrupt queue. Every memory
/// access and every interrupt is routed through the `Host` handed to
/// `cycle()`. In the kernel that host is the MMU and the interrupt queue;
/// in tests it is usually a flat byte array.
///
/// REAL CPU COMPARISON: A real processor checks its interrupt lines between
/// instructions. Here the kernel does that check on every clock pulse before
/// it decides to call `cycle()` at all, so an instruction is never started
/// while an interrupt is pending.
#[derive(Debug, Default)]
pub struct Cpu {
    pub regs: Registers,

    /// True while a program is loaded and running.
    pub is_executing: bool,

    /// Trace each decoded instruction through the host's trace port.
    pub verbose: bool,

    /// Remaining cycles before CPU_TIMER fires. None means disarmed.
    timer: Option<u32>,
}

impl Cpu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the countdown timer so CPU_TIMER is raised after `cycles` cycles.
    pub fn arm_timer(&mut self, cycles: u32) {
        self.timer = Some(cycles);
    }

    /// Disarm the countdown timer. Used by the non-preemptive policies.
    pub fn disarm_timer(&mut self) {
        self.timer = None;
    }

    pub fn timer(&self) -> Option<u32> {
        self.timer
    }

    /// Executes a single instruction cycle (fetch, decode, execute).
    ///
    /// EDUCATIONAL PURPOSE: This is the heart of the CPU, the instruction
    /// cycle. Every CPU follows this basic pattern:
    /// 1. Fetch: Read the opcode at PC, then as many operand bytes as it needs
    /// 2. Decode: Turn the raw bytes into an `Instruction`
    /// 3. Execute: Perform the operation and advance PC by the instruction width
    ///
    /// After execution the countdown timer ticks once. When it reaches zero
    /// a CPU_TIMER interrupt is raised and the timer disarms itself until the
    /// scheduler arms it again.
    ///
    /// ERROR HANDLING: An opcode outside the table raises SW_FATAL with the
    /// bad-opcode reason and stops execution. The CPU never skips over it.
    pub fn cycle<H: Host + ?Sized>(&mut self, host: &mut H) {
        let Some(instr) = self.fetch(host) else {
            return;
        };

        if self.verbose {
            host.trace(&format!("PC = 0x{:02x}, Instr = {}", self.regs.pc, instr.pretty_print()));
        }

        self.execute(instr, host);

        if self.is_executing {
            self.tick_timer(host);
        }
    }

    /// Alias for manual single stepping from a debugger.
    pub fn single_step<H: Host + ?Sized>(&mut self, host: &mut H) {
        self.cycle(host);
    }

    fn fetch<H: Host + ?Sized>(&mut self, host: &mut H) -> Option<Instruction> {
        let pc = self.regs.pc;
        let opcode = host.read(pc as u16);

        let Some(op) = Opcode::from_byte(opcode) else {
            self.unknown_instruction(opcode, host);
            return None;
        };

        let mut bytes = [opcode, 0, 0];
        for i in 1..op.width() {
            bytes[i as usize] = host.read(pc.wrapping_add(i) as u16);
        }
        decode(bytes)
    }

    fn unknown_instruction<H: Host + ?Sized>(&mut self, opcode: u8, host: &mut H) {
        host.trace(&format!(
            "🚨 Unknown or invalid instruction at PC = 0x{:02x} (byte: {:02x})",
            self.regs.pc, opcode
        ));
        host.raise(irq::SW_FATAL, &[FaultKind::BadOpcode.code()]);
        self.is_executing = false;
    }

    fn execute<H: Host + ?Sized>(&mut self, instr: Instruction, host: &mut H) {
        let regs = &mut self.regs;
        match instr {
            Instruction::LdaImm { value } => regs.acc = value,
            Instruction::LdaMem { addr } => regs.acc = host.read(addr),
            Instruction::Sta { addr } => host.write(addr, regs.acc),
            Instruction::Adc { addr } => regs.acc = regs.acc.wrapping_add(host.read(addr)),
            Instruction::LdxImm { value } => regs.x = value,
            Instruction::LdxMem { addr } => regs.x = host.read(addr),
            Instruction::LdyImm { value } => regs.y = value,
            Instruction::LdyMem { addr } => regs.y = host.read(addr),
            Instruction::Nop => {}
            Instruction::Brk => {
                // PC stays on the BRK so the exit report shows where it stopped.
                host.raise(irq::PROG_EXIT, &[]);
                return;
            }
            Instruction::Cpx { addr } => regs.z = (regs.x == host.read(addr)) as u8,
            Instruction::Bne { offset } => {
                if regs.z == 0 {
                    regs.pc = advance(regs.pc, offset as usize);
                }
            }
            Instruction::Inc { addr } => {
                let value = host.read(addr).wrapping_add(1);
                host.write(addr, value);
            }
            Instruction::Sys => host.raise(irq::SYS_CALL, &[]),
        }
        regs.pc = advance(regs.pc, instr.opcode().width() as usize);
    }

    fn tick_timer<H: Host + ?Sized>(&mut self, host: &mut H) {
        if let Some(remaining) = self.timer {
            let remaining = remaining.saturating_sub(1);
            if remaining == 0 {
                self.timer = None;
                host.raise(irq::CPU_TIMER, &[]);
            } else {
                self.timer = Some(remaining);
            }
        }
    }
}

/// PC arithmetic wraps inside the program's address space.
fn advance(pc: u8, by: usize) -> u8 {
    ((pc as usize + by) % Config::PROGRAM_ADDRESS_SPACE) as u8
}
