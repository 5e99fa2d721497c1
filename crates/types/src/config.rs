//! Compile-time machine configuration shared by every crate in the workspace.

pub struct Config;

impl Config {
    pub const VERSION: &'static str = "0.3.1";
    pub const NAME: &'static str = "CharonOS";

    /// Wall-clock length of one host clock pulse.
    pub const CPU_CLOCK_INTERVAL_MS: u64 = 10;
    /// Idle traces are emitted once every this many pulses (once per second).
    pub const IDLE_TRACE_EVERY: u64 = 1000 / Self::CPU_CLOCK_INTERVAL_MS;

    pub const MEMORY_SIZE: usize = 768;
    pub const MEMORY_BLOCK_SIZE: usize = 8;

    pub const PAGE_SIZE: usize = 256;
    pub const PROGRAM_ALLOWED_MEM: usize = 256;
    /// PC arithmetic wraps at the size of a program's address space.
    pub const PROGRAM_ADDRESS_SPACE: usize = 256;

    pub const DEFAULT_QUANTUM: u32 = 6;
    pub const DEFAULT_PRIORITY: u8 = 255;

    pub const DISK_TRACKS: u8 = 4;
    pub const DISK_SECTORS: u8 = 8;
    pub const DISK_BLOCKS: u8 = 8;
    pub const DISK_BLOCK_SIZE: usize = 64;
    /// Room for the MBR: magic header plus three pointers with separators.
    pub const DISK_MIN_BLOCK_SIZE: usize = 19;
    /// Payload lengths are stored in a single byte.
    pub const DISK_MAX_BLOCK_SIZE: usize = 256;
    /// Coordinates are single ASCII digits and 7-7-7 is the invalid pointer.
    pub const DISK_MAX_COORDINATE_COUNT: u8 = 8;

    /// Ticks between status refreshes issued by the front end.
    pub const STATUS_REFRESH_TICKS: i64 = 100;
}
