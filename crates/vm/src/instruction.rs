/// The opcode byte table understood by the virtual CPU.
///
/// EDUCATIONAL PURPOSE: The instruction set is a small subset of the 6502,
/// the processor found in the Apple II and the NES. Every instruction is one
/// opcode byte followed by zero, one or two operand bytes:
/// - Immediate forms carry the value itself in the next byte
/// - Memory forms carry a little-endian 16-bit address in the next two bytes
/// - BNE carries a one-byte relative jump distance
///
/// REGISTERS: The machine has an accumulator, two index registers (X and Y)
/// and a zero flag that only CPX writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    LdaImm = 0xA9,
    LdaMem = 0xAD,
    Sta = 0x8D,
    Adc = 0x6D,
    LdxImm = 0xA2,
    LdxMem = 0xAE,
    LdyImm = 0xA0,
    LdyMem = 0xAC,
    Nop = 0xEA,
    Brk = 0x00,
    Cpx = 0xEC,
    Bne = 0xD0,
    Inc = 0xEE,
    Sys = 0xFF,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        let op = match byte {
            0xA9 => Opcode::LdaImm,
            0xAD => Opcode::LdaMem,
            0x8D => Opcode::Sta,
            0x6D => Opcode::Adc,
            0xA2 => Opcode::LdxImm,
            0xAE => Opcode::LdxMem,
            0xA0 => Opcode::LdyImm,
            0xAC => Opcode::LdyMem,
            0xEA => Opcode::Nop,
            0x00 => Opcode::Brk,
            0xEC => Opcode::Cpx,
            0xD0 => Opcode::Bne,
            0xEE => Opcode::Inc,
            0xFF => Opcode::Sys,
            _ => return None,
        };
        Some(op)
    }

    /// Encoded width in bytes including the opcode byte.
    pub fn width(self) -> u8 {
        match self {
            Opcode::Nop | Opcode::Brk | Opcode::Sys => 1,
            Opcode::LdaImm | Opcode::LdxImm | Opcode::LdyImm | Opcode::Bne => 2,
            Opcode::LdaMem
            | Opcode::Sta
            | Opcode::Adc
            | Opcode::LdxMem
            | Opcode::LdyMem
            | Opcode::Cpx
            | Opcode::Inc => 3,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::LdaImm | Opcode::LdaMem => "LDA",
            Opcode::Sta => "STA",
            Opcode::Adc => "ADC",
            Opcode::LdxImm | Opcode::LdxMem => "LDX",
            Opcode::LdyImm | Opcode::LdyMem => "LDY",
            Opcode::Nop => "NOP",
            Opcode::Brk => "BRK",
            Opcode::Cpx => "CPX",
            Opcode::Bne => "BNE",
            Opcode::Inc => "INC",
            Opcode::Sys => "SYS",
        }
    }
}

/// A fully decoded instruction with its operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Acc = imm
    LdaImm { value: u8 },
    /// Acc = mem[addr]
    LdaMem { addr: u16 },
    /// mem[addr] = Acc
    Sta { addr: u16 },
    /// Acc = (Acc + mem[addr]) mod 256
    Adc { addr: u16 },
    LdxImm { value: u8 },
    LdxMem { addr: u16 },
    LdyImm { value: u8 },
    LdyMem { addr: u16 },
    Nop,
    /// Program exit.
    Brk,
    /// Z = (X == mem[addr])
    Cpx { addr: u16 },
    /// Branch forward by `offset` (mod 256) when Z is clear.
    Bne { offset: u8 },
    /// mem[addr] = (mem[addr] + 1) mod 256
    Inc { addr: u16 },
    /// System call selected by X, argument in Y.
    Sys,
}

impl Instruction {
    pub fn opcode(&self) -> Opcode {
        match self {
            Instruction::LdaImm { .. } => Opcode::LdaImm,
            Instruction::LdaMem { .. } => Opcode::LdaMem,
            Instruction::Sta { .. } => Opcode::Sta,
            Instruction::Adc { .. } => Opcode::Adc,
            Instruction::LdxImm { .. } => Opcode::LdxImm,
            Instruction::LdxMem { .. } => Opcode::LdxMem,
            Instruction::LdyImm { .. } => Opcode::LdyImm,
            Instruction::LdyMem { .. } => Opcode::LdyMem,
            Instruction::Nop => Opcode::Nop,
            Instruction::Brk => Opcode::Brk,
            Instruction::Cpx { .. } => Opcode::Cpx,
            Instruction::Bne { .. } => Opcode::Bne,
            Instruction::Inc { .. } => Opcode::Inc,
            Instruction::Sys => Opcode::Sys,
        }
    }

    pub fn pretty_print(&self) -> String {
        let name = self.opcode().mnemonic();
        match *self {
            Instruction::LdaImm { value }
            | Instruction::LdxImm { value }
            | Instruction::LdyImm { value } => format!("{} #${:02X}", name, value),
            Instruction::LdaMem { addr }
            | Instruction::Sta { addr }
            | Instruction::Adc { addr }
            | Instruction::LdxMem { addr }
            | Instruction::LdyMem { addr }
            | Instruction::Cpx { addr }
            | Instruction::Inc { addr } => format!("{} ${:04X}", name, addr),
            Instruction::Bne { offset } => format!("{} ${:02X}", name, offset),
            Instruction::Nop | Instruction::Brk | Instruction::Sys => name.to_string(),
        }
    }
}
