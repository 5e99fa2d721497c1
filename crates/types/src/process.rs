use core::fmt;

pub type Pid = u32;

/// Lower is more urgent.
pub type Priority = u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessState {
    New,
    Ready,
    Running,
    /// Reserved for I/O blocking, never entered today.
    Waiting,
    Failed,
    Done,
}

impl ProcessState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessState::Failed | ProcessState::Done)
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessState::New => "new",
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Waiting => "waiting",
            ProcessState::Failed => "failed",
            ProcessState::Done => "done",
        };
        f.write_str(s)
    }
}
