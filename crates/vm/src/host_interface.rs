use types::Irq;

/// Process-relative memory access. Addresses are the raw 16-bit operand;
/// bounds are enforced by whoever implements the port.
pub trait MemoryPort {
    fn read(&mut self, addr: u16) -> u8;
    fn write(&mut self, addr: u16, value: u8);
}

/// Queues an interrupt on behalf of the CPU. The CPU never services it.
pub trait InterruptPort {
    fn raise(&mut self, irq: Irq, args: &[i64]);
}

pub trait TracePort {
    fn trace(&mut self, _message: &str) {}
}

/// Everything the CPU needs from its surroundings for one cycle.
pub trait Host: MemoryPort + InterruptPort + TracePort {}

impl<T: MemoryPort + InterruptPort + TracePort> Host for T {}
