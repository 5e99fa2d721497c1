//! Interrupt request numbers.

pub type Irq = u32;

pub const TIMER: Irq = 0;
pub const KEYBOARD: Irq = 1;
pub const DISPLAY: Irq = 2;
pub const SYS_CALL: Irq = 3;
pub const SW_FATAL: Irq = 4;
pub const PROG_EXIT: Irq = 5;
pub const PROG_STEP: Irq = 6;
pub const CPU_TIMER: Irq = 7;
pub const CONTEXT_SWITCH: Irq = 8;

/// Human readable IRQ name for traces.
pub fn name(irq: Irq) -> &'static str {
    match irq {
        TIMER => "TIMER",
        KEYBOARD => "KEYBOARD",
        DISPLAY => "DISPLAY",
        SYS_CALL => "SYS_CALL",
        SW_FATAL => "SW_FATAL",
        PROG_EXIT => "PROG_EXIT",
        PROG_STEP => "PROG_STEP",
        CPU_TIMER => "CPU_TIMER",
        CONTEXT_SWITCH => "CONTEXT_SWITCH",
        _ => "UNKNOWN",
    }
}
