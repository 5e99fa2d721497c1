use std::fmt;

/// Architectural register file. Every register is a single byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Registers {
    pub pc: u8,
    pub acc: u8,
    pub x: u8,
    pub y: u8,
    /// Zero flag, set by CPX. Either 0 or 1.
    pub z: u8,
}

impl Registers {
    pub fn clear(&mut self) {
        *self = Registers::default();
    }
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PC: {:02X} ACC: {:02X} X: {:02X} Y: {:02X} Z: {}",
            self.pc, self.acc, self.x, self.y, self.z
        )
    }
}
