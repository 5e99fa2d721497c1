use storage::DiskError;
use thiserror::Error;
use types::Pid;

/// File system failures. The first four are user-facing resource errors;
/// `Corrupt` and `Disk` mean the on-disk structure can no longer be trusted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("name too long")]
    NameTooLong,
    #[error("file exists")]
    Exists,
    #[error("no such file")]
    NoSuchFile,
    #[error("no space")]
    NoSpace,
    #[error("disk corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Disk(#[from] DiskError),
}

impl FsError {
    /// True for errors that mean the disk structure itself is broken.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FsError::Corrupt(_) | FsError::Disk(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MmuError {
    #[error("allocation of {requested} bytes exceeds the {limit} byte ceiling")]
    CeilingExceeded { requested: usize, limit: usize },
    #[error("memory access violation in process {0}")]
    Violation(Pid),
    #[error("no physical page available for swap")]
    NoFrame,
    #[error("backing store: {0}")]
    Backing(#[from] FsError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    #[error("invalid key code {0}")]
    InvalidKey(i64),
    #[error("missing interrupt parameter")]
    MissingParam,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KernelError {
    #[error("no such process {0}")]
    NoSuchProcess(Pid),
    #[error("program of {0} bytes does not fit in memory")]
    ProgramTooLarge(usize),
    #[error("process {0} is already running")]
    Busy(Pid),
    #[error("{0} processes are resident")]
    Resident(usize),
    #[error("unable to allocate memory: {0}")]
    Alloc(#[from] MmuError),
    #[error("{0}")]
    Fs(#[from] FsError),
    #[error("driver: {0}")]
    Driver(#[from] DriverError),
    #[error("kernel halted: {0}")]
    Halted(String),
}
