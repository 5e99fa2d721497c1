use types::Config;

/// Flat physical memory addressed by absolute byte offset.
///
/// Rows of `Config::MEMORY_BLOCK_SIZE` bytes exist only for display; every
/// access is a plain index. Indexing past the end is a bug in the caller
/// (the MMU enforces process bounds above this layer) and panics.
#[derive(Debug, Clone)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new(Config::MEMORY_SIZE)
    }
}

impl Memory {
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0u8; size],
        }
    }

    pub fn size(&self) -> usize {
        self.cells.len()
    }

    pub fn read(&self, addr: usize) -> u8 {
        if addr >= self.cells.len() {
            panic!("memory read out of bounds: addr = 0x{:04x}", addr);
        }
        self.cells[addr]
    }

    pub fn write(&mut self, addr: usize, value: u8) {
        if addr >= self.cells.len() {
            panic!("memory write out of bounds: addr = 0x{:04x}", addr);
        }
        self.cells[addr] = value;
    }

    pub fn slice(&self, start: usize, len: usize) -> &[u8] {
        &self.cells[start..start + len]
    }

    pub fn copy_in(&mut self, start: usize, bytes: &[u8]) {
        self.cells[start..start + bytes.len()].copy_from_slice(bytes);
    }

    pub fn fill(&mut self, start: usize, len: usize, value: u8) {
        self.cells[start..start + len].fill(value);
    }

    pub fn row(addr: usize) -> usize {
        addr / Config::MEMORY_BLOCK_SIZE
    }

    pub fn column(addr: usize) -> usize {
        addr % Config::MEMORY_BLOCK_SIZE
    }

    /// Hex dump of `[start, end)` in display rows, one line per row.
    pub fn dump(&self, start: usize, end: usize) -> Vec<String> {
        let end = end.min(self.cells.len());
        let mut lines = Vec::new();
        let mut addr = start - Self::column(start);
        while addr < end {
            let row_end = (addr + Config::MEMORY_BLOCK_SIZE).min(end);
            let bytes = self.cells[addr..row_end]
                .iter()
                .map(|b| format!("{:02X}", b))
                .collect::<Vec<_>>()
                .join(" ");
            lines.push(format!("0x{:03X}: {}", addr, bytes));
            addr += Config::MEMORY_BLOCK_SIZE;
        }
        lines
    }
}
