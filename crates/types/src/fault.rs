use core::fmt;

/// Reason carried by a SW_FATAL interrupt. Always fatal to the process only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    BadOpcode,
    MemoryViolation,
    BadSyscall,
}

impl FaultKind {
    pub fn code(self) -> i64 {
        match self {
            FaultKind::BadOpcode => 0,
            FaultKind::MemoryViolation => 1,
            FaultKind::BadSyscall => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(FaultKind::BadOpcode),
            1 => Some(FaultKind::MemoryViolation),
            2 => Some(FaultKind::BadSyscall),
            _ => None,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FaultKind::BadOpcode => "bad opcode",
            FaultKind::MemoryViolation => "memory access violation",
            FaultKind::BadSyscall => "bad syscall",
        };
        f.write_str(s)
    }
}
