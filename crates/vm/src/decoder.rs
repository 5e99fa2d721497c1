use crate::instruction::{Instruction, Opcode};

/// Decodes one instruction from up to three fetched bytes.
///
/// `bytes[0]` is the opcode. Operand bytes past the instruction's width are
/// ignored, so callers may pass whatever trails the opcode in memory.
/// Returns None for bytes that are not in the opcode table.
pub fn decode(bytes: [u8; 3]) -> Option<Instruction> {
    let op = Opcode::from_byte(bytes[0])?;
    let imm = bytes[1];
    let addr = u16::from_le_bytes([bytes[1], bytes[2]]);

    let instr = match op {
        Opcode::LdaImm => Instruction::LdaImm { value: imm },
        Opcode::LdaMem => Instruction::LdaMem { addr },
        Opcode::Sta => Instruction::Sta { addr },
        Opcode::Adc => Instruction::Adc { addr },
        Opcode::LdxImm => Instruction::LdxImm { value: imm },
        Opcode::LdxMem => Instruction::LdxMem { addr },
        Opcode::LdyImm => Instruction::LdyImm { value: imm },
        Opcode::LdyMem => Instruction::LdyMem { addr },
        Opcode::Nop => Instruction::Nop,
        Opcode::Brk => Instruction::Brk,
        Opcode::Cpx => Instruction::Cpx { addr },
        Opcode::Bne => Instruction::Bne { offset: imm },
        Opcode::Inc => Instruction::Inc { addr },
        Opcode::Sys => Instruction::Sys,
    };
    Some(instr)
}
