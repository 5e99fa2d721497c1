use std::collections::{HashMap, VecDeque};

use storage::Tsb;
use types::Config;
use vm::Memory;

use crate::error::{FsError, MmuError};
use crate::pcb::Pcb;

/// Opaque page identifier, assigned monotonically.
pub type PageId = u32;

/// Swap space for pages that do not fit in physical memory.
pub trait BackingStore {
    /// Reserve a zero-filled page and return its key.
    fn allocate_page(&mut self) -> Result<Tsb, FsError>;
    fn read_page(&mut self, key: Tsb) -> Result<Vec<u8>, FsError>;
    fn write_page(&mut self, key: Tsb, data: &[u8]) -> Result<(), FsError>;
    fn release_page(&mut self, key: Tsb) -> Result<(), FsError>;
}

/// Pool of free physical frames, handed out lowest first.
#[derive(Debug, Clone)]
pub struct FramePool {
    free: VecDeque<usize>,
}

impl FramePool {
    pub fn new(frames: usize) -> Self {
        Self {
            free: (0..frames).collect(),
        }
    }

    /// Take a free frame, or None if exhausted.
    pub fn alloc(&mut self) -> Option<usize> {
        self.free.pop_front()
    }

    pub fn release(&mut self, frame: usize) {
        self.free.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

/// Memory management unit.
///
/// EDUCATIONAL PURPOSE: Every process sees its own address space starting
/// at 0. The MMU maps each process page to either:
/// - a physical frame (the page is cached), or
/// - a backing-store key on disk (the page is swapped out)
///
/// INVARIANT: a live page is in exactly one of `cached` and `backed`.
///
/// SWAPPING: When a process touches a swapped-out page, a victim frame is
/// chosen with the second-chance clock: frames touched since the hand last
/// passed get their reference bit cleared and are skipped once. The
/// victim's bytes go out under the incoming page's disk key, the incoming
/// bytes come into the victim's frame, and the two pages trade places.
#[derive(Debug)]
pub struct Mmu {
    memory: Memory,
    frames: FramePool,
    frame_count: usize,
    cached: HashMap<PageId, usize>,
    backed: HashMap<PageId, Tsb>,
    /// Page resident in each frame.
    owners: Vec<Option<PageId>>,
    referenced: Vec<bool>,
    hand: usize,
    next_page: PageId,
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new(Memory::default())
    }
}

impl Mmu {
    pub fn new(memory: Memory) -> Self {
        let frame_count = memory.size() / Config::PAGE_SIZE;
        Self {
            memory,
            frames: FramePool::new(frame_count),
            frame_count,
            cached: HashMap::new(),
            backed: HashMap::new(),
            owners: vec![None; frame_count],
            referenced: vec![false; frame_count],
            hand: 0,
            next_page: 0,
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn read(
        &mut self,
        pcb: &Pcb,
        addr: u16,
        backing: &mut dyn BackingStore,
    ) -> Result<u8, MmuError> {
        self.check_bounds(pcb, addr)?;
        let phys = self.translate(pcb, addr as usize, backing)?;
        Ok(self.memory.read(phys))
    }

    pub fn write(
        &mut self,
        pcb: &Pcb,
        addr: u16,
        value: u8,
        backing: &mut dyn BackingStore,
    ) -> Result<(), MmuError> {
        self.check_bounds(pcb, addr)?;
        let phys = self.translate(pcb, addr as usize, backing)?;
        self.memory.write(phys, value);
        Ok(())
    }

    fn check_bounds(&self, pcb: &Pcb, addr: u16) -> Result<(), MmuError> {
        if (addr as usize) < pcb.mem_limit {
            Ok(())
        } else {
            Err(MmuError::Violation(pcb.pid))
        }
    }

    /// Resolve a process address to a physical address, swapping the page
    /// in if needed. Callers must have checked `addr < pcb.mem_limit`.
    pub fn translate(
        &mut self,
        pcb: &Pcb,
        addr: usize,
        backing: &mut dyn BackingStore,
    ) -> Result<usize, MmuError> {
        let page = pcb
            .page_list
            .get(addr / Config::PAGE_SIZE)
            .copied()
            .ok_or(MmuError::Violation(pcb.pid))?;

        let frame = match self.cached.get(&page) {
            Some(frame) => *frame,
            None => self.swap_in(page, backing)?,
        };
        self.referenced[frame] = true;
        Ok(frame * Config::PAGE_SIZE + addr % Config::PAGE_SIZE)
    }

    fn swap_in(&mut self, page: PageId, backing: &mut dyn BackingStore) -> Result<usize, MmuError> {
        let key = self
            .backed
            .get(&page)
            .copied()
            .ok_or_else(|| FsError::Corrupt(format!("page {} has no mapping", page)))?;
        let incoming = backing.read_page(key)?;

        // A frame freed by another process can take the page directly.
        if let Some(frame) = self.frames.alloc() {
            self.load_frame(frame, &incoming);
            backing.release_page(key)?;
            self.backed.remove(&page);
            self.map_frame(page, frame);
            return Ok(frame);
        }

        let frame = self.pick_victim().ok_or(MmuError::NoFrame)?;
        let victim = self.owners[frame].ok_or(MmuError::NoFrame)?;
        let base = frame * Config::PAGE_SIZE;
        let outgoing = self.memory.slice(base, Config::PAGE_SIZE).to_vec();
        backing.write_page(key, &outgoing)?;
        self.load_frame(frame, &incoming);

        log::debug!("swap: page {} out to {}, page {} in to frame {}", victim, key, page, frame);
        self.cached.remove(&victim);
        self.backed.insert(victim, key);
        self.backed.remove(&page);
        self.map_frame(page, frame);
        Ok(frame)
    }

    fn load_frame(&mut self, frame: usize, bytes: &[u8]) {
        let base = frame * Config::PAGE_SIZE;
        let len = bytes.len().min(Config::PAGE_SIZE);
        self.memory.fill(base, Config::PAGE_SIZE, 0);
        self.memory.copy_in(base, &bytes[..len]);
    }

    fn map_frame(&mut self, page: PageId, frame: usize) {
        self.cached.insert(page, frame);
        self.owners[frame] = Some(page);
        self.referenced[frame] = true;
    }

    /// Second-chance clock over occupied frames.
    fn pick_victim(&mut self) -> Option<usize> {
        for _ in 0..2 * self.frame_count {
            let frame = self.hand;
            self.hand = (self.hand + 1) % self.frame_count.max(1);
            if self.owners.get(frame).copied().flatten().is_none() {
                continue;
            }
            if self.referenced[frame] {
                self.referenced[frame] = false;
            } else {
                return Some(frame);
            }
        }
        None
    }

    /// Map `bytes` more bytes for the process: physical frames first, the
    /// rest from the backing store. On failure nothing from this call stays
    /// allocated.
    pub fn allocate_mem(
        &mut self,
        pcb: &mut Pcb,
        bytes: usize,
        backing: &mut dyn BackingStore,
    ) -> Result<(), MmuError> {
        if pcb.mem_limit + bytes > Config::PROGRAM_ALLOWED_MEM {
            return Err(MmuError::CeilingExceeded {
                requested: bytes,
                limit: Config::PROGRAM_ALLOWED_MEM,
            });
        }

        let pages_before = pcb.page_list.len();
        let mut allocd = 0;
        while allocd < bytes {
            let page = self.next_page();
            if let Some(frame) = self.frames.alloc() {
                self.owners[frame] = Some(page);
                self.referenced[frame] = false;
                self.cached.insert(page, frame);
            } else {
                match backing.allocate_page() {
                    Ok(key) => {
                        self.backed.insert(page, key);
                    }
                    Err(err) => {
                        log::debug!("backing allocation failed for pid {}: {}", pcb.pid, err);
                        let partial = (pcb.page_list.len() - pages_before) * Config::PAGE_SIZE;
                        self.free_mem(pcb, partial, backing)?;
                        return Err(err.into());
                    }
                }
            }
            pcb.page_list.push(page);
            allocd += Config::PAGE_SIZE;
        }

        pcb.mem_limit = pcb.page_list.len() * Config::PAGE_SIZE;
        Ok(())
    }

    /// Release pages from the tail of the page list until `bytes` worth
    /// have been reclaimed.
    pub fn free_mem(
        &mut self,
        pcb: &mut Pcb,
        bytes: usize,
        backing: &mut dyn BackingStore,
    ) -> Result<(), MmuError> {
        let mut freed = 0;
        while freed + Config::PAGE_SIZE <= bytes {
            let Some(page) = pcb.page_list.pop() else {
                break;
            };
            if let Some(frame) = self.cached.remove(&page) {
                self.owners[frame] = None;
                self.referenced[frame] = false;
                self.frames.release(frame);
            } else if let Some(key) = self.backed.remove(&page) {
                backing.release_page(key)?;
            }
            freed += Config::PAGE_SIZE;
        }
        pcb.mem_limit = pcb.page_list.len() * Config::PAGE_SIZE;
        Ok(())
    }

    pub fn free_all(&mut self, pcb: &mut Pcb, backing: &mut dyn BackingStore) -> Result<(), MmuError> {
        let bytes = pcb.page_list.len() * Config::PAGE_SIZE;
        self.free_mem(pcb, bytes, backing)
    }

    /// Zero every page the process owns, wherever it lives.
    pub fn zero_mem(&mut self, pcb: &Pcb, backing: &mut dyn BackingStore) -> Result<(), MmuError> {
        let zero_page = vec![0u8; Config::PAGE_SIZE];
        for page in &pcb.page_list {
            if let Some(frame) = self.cached.get(page) {
                self.memory.fill(frame * Config::PAGE_SIZE, Config::PAGE_SIZE, 0);
            } else if let Some(key) = self.backed.get(page) {
                backing.write_page(*key, &zero_page)?;
            }
        }
        Ok(())
    }

    fn next_page(&mut self) -> PageId {
        let page = self.next_page;
        self.next_page += 1;
        page
    }

    pub fn is_cached(&self, page: PageId) -> bool {
        self.cached.contains_key(&page)
    }

    pub fn is_backed(&self, page: PageId) -> bool {
        self.backed.contains_key(&page)
    }

    pub fn frame_of(&self, page: PageId) -> Option<usize> {
        self.cached.get(&page).copied()
    }

    pub fn free_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Number of live pages, cached plus backed.
    pub fn live_pages(&self) -> usize {
        self.cached.len() + self.backed.len()
    }

    pub fn backed_pages(&self) -> usize {
        self.backed.len()
    }
}
