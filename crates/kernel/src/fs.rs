use std::collections::{BTreeMap, HashSet};

use storage::tsb::POINTER_LEN;
use storage::{Disk, DiskError, Tsb};
use types::Config;

use crate::console::Console;
use crate::driver::DeviceDriver;
use crate::error::{DriverError, FsError, KernelError};
use crate::interrupt::Param;
use crate::mmu::BackingStore;

/// End of meaningful payload inside a block.
pub const EOF: u8 = 0x26;
pub const MBR: Tsb = Tsb::new(0, 0, 0);
pub const MBR_HEADER: &[u8] = b"CHARON";
/// First directory ("index") block.
pub const INDEX_START: Tsb = Tsb::new(0, 0, 1);
/// First data block. Everything before it is MBR or index.
pub const DATA_START: Tsb = Tsb::new(1, 0, 0);

const FREE_INDEX_OFFSET: usize = MBR_HEADER.len() + 1;
const FREE_DATA_OFFSET: usize = FREE_INDEX_OFFSET + POINTER_LEN + 1;
const DIR_HEAD_OFFSET: usize = FREE_DATA_OFFSET + POINTER_LEN + 1;

/// Data block: next(3) | len(1) | payload | EOF
const DATA_LEN_OFFSET: usize = POINTER_LEN;
const DATA_PAYLOAD_OFFSET: usize = DATA_LEN_OFFSET + 1;
/// Index block: next(3) | data(3) | len(1) | name | EOF
const INDEX_DATA_OFFSET: usize = POINTER_LEN;
const INDEX_LEN_OFFSET: usize = INDEX_DATA_OFFSET + POINTER_LEN;
const INDEX_NAME_OFFSET: usize = INDEX_LEN_OFFSET + 1;
const MBR_LEN: usize = DIR_HEAD_OFFSET + POINTER_LEN + 1;

const _: () = assert!(MBR_LEN <= Config::DISK_MIN_BLOCK_SIZE);
const _: () = assert!(Config::DISK_MAX_BLOCK_SIZE - DATA_PAYLOAD_OFFSET - 1 <= u8::MAX as usize);

/// Directory cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry {
    pub index: Tsb,
    pub data: Tsb,
}

/// File system driver over the raw disk.
///
/// EDUCATIONAL PURPOSE: This driver shows how a file system can be built
/// from nothing but fixed-size blocks and pointers:
/// - The Master Boot Record at (0,0,0) holds a magic header and three chain
///   heads: free index blocks, free data blocks and the directory
/// - Index blocks form the directory, one per file, each pointing at the
///   next entry and at the file's first data block
/// - Data blocks form one singly linked chain per file
/// - Free blocks are threaded through their own contents, so there is no
///   separate free-list structure anywhere on disk
///
/// FAILURE POLICY: Every mutating operation either completes or leaves
/// the disk exactly as it was. `write` allocates everything it needs before
/// touching the existing chain, and hands back what it took if it runs out.
#[derive(Debug)]
pub struct FileSystemDriver {
    disk: Disk,
    files: BTreeMap<String, FileEntry>,
    max_name_len: usize,
    data_bytes_per_block: usize,
    status: String,
}

impl FileSystemDriver {
    pub fn new(disk: Disk) -> Self {
        let block_size = disk.block_size();
        Self {
            disk,
            files: BTreeMap::new(),
            max_name_len: block_size.saturating_sub(INDEX_NAME_OFFSET + 1),
            data_bytes_per_block: block_size.saturating_sub(DATA_PAYLOAD_OFFSET + 1),
            status: "unloaded".to_string(),
        }
    }

    pub fn disk(&self) -> &Disk {
        &self.disk
    }

    pub fn into_disk(self) -> Disk {
        self.disk
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    pub fn data_bytes_per_block(&self) -> usize {
        self.data_bytes_per_block
    }

    /// Rewrite the MBR and thread every index and data block into its free chain.
    pub fn format(&mut self) -> Result<(), FsError> {
        self.check_geometry()?;
        let mut mbr = Vec::with_capacity(MBR_LEN);
        mbr.extend_from_slice(MBR_HEADER);
        mbr.push(0);
        mbr.extend_from_slice(&INDEX_START.to_bytes());
        mbr.push(0);
        mbr.extend_from_slice(&DATA_START.to_bytes());
        mbr.push(0);
        mbr.extend_from_slice(&Tsb::INVALID.to_bytes());
        mbr.push(EOF);
        self.write_block(MBR, &mbr)?;

        let geometry = self.disk.geometry();
        let index_region: Vec<Tsb> = geometry
            .addresses()
            .filter(|tsb| *tsb >= INDEX_START && *tsb < DATA_START)
            .collect();
        let data_region: Vec<Tsb> = geometry.addresses().filter(|tsb| *tsb >= DATA_START).collect();
        for region in [index_region, data_region] {
            for (i, tsb) in region.iter().enumerate() {
                let next = region.get(i + 1).copied().unwrap_or(Tsb::INVALID);
                self.write_free_block(*tsb, next)?;
            }
        }

        self.files.clear();
        log::info!("formatted disk: {} blocks", geometry.block_count());
        Ok(())
    }

    /// Pop the head of the index or data free chain. None when the chain is empty.
    pub fn allocate(&mut self, is_index: bool) -> Result<Option<Tsb>, FsError> {
        let offset = Self::free_offset(is_index);
        let head = self.mbr_pointer(offset)?;
        if head.is_invalid() {
            return Ok(None);
        }
        let next = self.pointer_at(head, 0)?;
        self.set_mbr_pointer(offset, next)?;

        let mut fresh = Tsb::INVALID.to_bytes().to_vec();
        if is_index {
            fresh.extend_from_slice(&Tsb::INVALID.to_bytes());
        }
        fresh.push(0);
        fresh.push(EOF);
        self.write_block(head, &fresh)?;
        Ok(Some(head))
    }

    /// Push a block back onto the head of its free chain.
    pub fn free(&mut self, addr: Tsb, is_index: bool) -> Result<(), FsError> {
        let offset = Self::free_offset(is_index);
        let head = self.mbr_pointer(offset)?;
        self.write_free_block(addr, head)?;
        self.set_mbr_pointer(offset, addr)
    }

    pub fn create_file(&mut self, name: &str) -> Result<(), FsError> {
        if name.len() > self.max_name_len {
            return Err(FsError::NameTooLong);
        }
        if self.scan_directory(name)?.is_some() {
            return Err(FsError::Exists);
        }

        let index = self.allocate(true)?.ok_or(FsError::NoSpace)?;
        let data = match self.allocate(false)? {
            Some(data) => data,
            None => {
                self.free(index, true)?;
                return Err(FsError::NoSpace);
            }
        };

        let dir_head = self.mbr_pointer(DIR_HEAD_OFFSET)?;
        let mut block = dir_head.to_bytes().to_vec();
        block.extend_from_slice(&data.to_bytes());
        block.push(name.len() as u8);
        block.extend_from_slice(name.as_bytes());
        block.push(EOF);
        self.write_block(index, &block)?;
        self.set_mbr_pointer(DIR_HEAD_OFFSET, index)?;

        self.files.insert(name.to_string(), FileEntry { index, data });
        log::debug!("created file {:?} (index {}, data {})", name, index, data);
        Ok(())
    }

    pub fn write_file(&mut self, name: &str, data: &[u8]) -> Result<(), FsError> {
        let entry = self.lookup(name)?;
        self.write(entry.data, data)
    }

    pub fn read_file(&self, name: &str) -> Result<Vec<u8>, FsError> {
        let entry = self.lookup(name)?;
        self.read(entry.data)
    }

    pub fn delete_file(&mut self, name: &str) -> Result<(), FsError> {
        let entry = self.lookup(name)?;

        for block in self.chain(entry.data)? {
            self.free(block, false)?;
        }

        let next = self.pointer_at(entry.index, 0)?;
        let dir_head = self.mbr_pointer(DIR_HEAD_OFFSET)?;
        if dir_head == entry.index {
            self.set_mbr_pointer(DIR_HEAD_OFFSET, next)?;
        } else {
            let directory = self.chain(dir_head)?;
            let pred = directory
                .iter()
                .position(|tsb| *tsb == entry.index)
                .and_then(|i| i.checked_sub(1))
                .map(|i| directory[i])
                .ok_or_else(|| FsError::Corrupt(format!("{} missing from directory", entry.index)))?;
            self.disk.write(pred, &next.to_bytes())?;
        }
        self.free(entry.index, true)?;

        self.files.remove(name);
        log::debug!("deleted file {:?}", name);
        Ok(())
    }

    /// Walk the directory from the MBR and rebuild the name cache.
    pub fn enumerate_files(&mut self) -> Result<(), FsError> {
        let dir_head = self.mbr_pointer(DIR_HEAD_OFFSET)?;
        let mut files = BTreeMap::new();
        for index in self.chain(dir_head)? {
            let (name, data) = self.parse_index(index)?;
            files.insert(name, FileEntry { index, data });
        }
        self.files = files;
        Ok(())
    }

    /// Sorted file names from the directory cache.
    pub fn list_files(&self) -> Vec<String> {
        self.files.keys().cloned().collect()
    }

    pub fn entry(&self, name: &str) -> Option<FileEntry> {
        self.files.get(name).copied()
    }

    /// Concatenate the payload of every block in the chain starting at `addr`.
    pub fn read(&self, addr: Tsb) -> Result<Vec<u8>, FsError> {
        let mut out = Vec::new();
        for tsb in self.chain(addr)? {
            out.extend_from_slice(self.payload(tsb)?);
        }
        Ok(out)
    }

    /// Replace the contents of the chain at `addr` with `data`, growing or
    /// shrinking the chain as needed. Fails with no change on disk when
    /// there are not enough free data blocks.
    pub fn write(&mut self, addr: Tsb, data: &[u8]) -> Result<(), FsError> {
        let chunks: Vec<&[u8]> = if data.is_empty() {
            vec![data]
        } else {
            data.chunks(self.data_bytes_per_block).collect()
        };

        let mut chain = self.chain(addr)?;
        let existing = chain.len();

        let mut fresh = Vec::new();
        while existing + fresh.len() < chunks.len() {
            match self.allocate(false)? {
                Some(tsb) => fresh.push(tsb),
                None => {
                    for tsb in fresh.into_iter().rev() {
                        self.free(tsb, false)?;
                    }
                    return Err(FsError::NoSpace);
                }
            }
        }
        chain.extend(fresh);

        let surplus = chain.split_off(chunks.len());
        for (i, (tsb, chunk)) in chain.iter().zip(chunks.iter()).enumerate() {
            let next = chain.get(i + 1).copied().unwrap_or(Tsb::INVALID);
            let mut block = next.to_bytes().to_vec();
            block.push(chunk.len() as u8);
            block.extend_from_slice(chunk);
            block.push(EOF);
            self.write_block(*tsb, &block)?;
        }
        for tsb in surplus {
            self.free(tsb, false)?;
        }
        Ok(())
    }

    /// Addresses of the chain starting at `head`, stopping at the invalid
    /// pointer. Cycles and pointers off the disk are corruption.
    pub fn chain(&self, head: Tsb) -> Result<Vec<Tsb>, FsError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut cur = head;
        while !cur.is_invalid() {
            if !self.disk.geometry().contains(cur) {
                return Err(FsError::Corrupt(format!("pointer {} is off the disk", cur)));
            }
            if !seen.insert(cur) {
                return Err(FsError::Corrupt(format!("cycle at {}", cur)));
            }
            out.push(cur);
            cur = self.pointer_at(cur, 0)?;
        }
        Ok(out)
    }

    pub fn directory_head(&self) -> Result<Tsb, FsError> {
        self.mbr_pointer(DIR_HEAD_OFFSET)
    }

    pub fn free_index_head(&self) -> Result<Tsb, FsError> {
        self.mbr_pointer(FREE_INDEX_OFFSET)
    }

    pub fn free_data_head(&self) -> Result<Tsb, FsError> {
        self.mbr_pointer(FREE_DATA_OFFSET)
    }

    /// Number of free (index, data) blocks.
    pub fn free_block_counts(&self) -> Result<(usize, usize), FsError> {
        let index = self.chain(self.free_index_head()?)?.len();
        let data = self.chain(self.free_data_head()?)?.len();
        Ok((index, data))
    }

    fn lookup(&self, name: &str) -> Result<FileEntry, FsError> {
        self.files.get(name).copied().ok_or(FsError::NoSuchFile)
    }

    fn scan_directory(&self, name: &str) -> Result<Option<Tsb>, FsError> {
        for index in self.chain(self.directory_head()?)? {
            if self.parse_index(index)?.0 == name {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn parse_index(&self, index: Tsb) -> Result<(String, Tsb), FsError> {
        let block = self.disk.read(index)?;
        let data = self.pointer_at(index, INDEX_DATA_OFFSET)?;
        let len = block[INDEX_LEN_OFFSET] as usize;
        if len > self.max_name_len || block[INDEX_NAME_OFFSET + len] != EOF {
            return Err(FsError::Corrupt(format!("bad index block {}", index)));
        }
        let name = String::from_utf8_lossy(&block[INDEX_NAME_OFFSET..INDEX_NAME_OFFSET + len]);
        Ok((name.into_owned(), data))
    }

    fn payload(&self, tsb: Tsb) -> Result<&[u8], FsError> {
        let block = self.disk.read(tsb)?;
        let len = block[DATA_LEN_OFFSET] as usize;
        if len > self.data_bytes_per_block || block[DATA_PAYLOAD_OFFSET + len] != EOF {
            return Err(FsError::Corrupt(format!("bad data block {}", tsb)));
        }
        Ok(&block[DATA_PAYLOAD_OFFSET..DATA_PAYLOAD_OFFSET + len])
    }

    fn free_offset(is_index: bool) -> usize {
        if is_index {
            FREE_INDEX_OFFSET
        } else {
            FREE_DATA_OFFSET
        }
    }

    fn pointer_at(&self, tsb: Tsb, offset: usize) -> Result<Tsb, FsError> {
        let block = self.disk.read(tsb)?;
        Tsb::from_bytes(&block[offset..])
            .ok_or_else(|| FsError::Corrupt(format!("bad pointer in {} at {}", tsb, offset)))
    }

    fn mbr_pointer(&self, offset: usize) -> Result<Tsb, FsError> {
        self.pointer_at(MBR, offset)
    }

    fn set_mbr_pointer(&mut self, offset: usize, tsb: Tsb) -> Result<(), FsError> {
        let mut mbr = self.disk.read(MBR)?.to_vec();
        mbr[offset..offset + POINTER_LEN].copy_from_slice(&tsb.to_bytes());
        self.disk.write(MBR, &mbr)?;
        Ok(())
    }

    fn write_free_block(&mut self, tsb: Tsb, next: Tsb) -> Result<(), FsError> {
        let mut block = next.to_bytes().to_vec();
        block.push(EOF);
        self.write_block(tsb, &block)
    }

    /// Write a whole block, zero-padding past `bytes`.
    fn write_block(&mut self, tsb: Tsb, bytes: &[u8]) -> Result<(), FsError> {
        let mut block = vec![0u8; self.disk.block_size()];
        block[..bytes.len()].copy_from_slice(bytes);
        self.disk.write(tsb, &block)?;
        Ok(())
    }

    /// The disk must hold an MBR, at least one index block and one data block.
    fn check_geometry(&self) -> Result<(), FsError> {
        let geometry = self.disk.geometry();
        geometry.validate()?;
        if !geometry.contains(INDEX_START) || !geometry.contains(DATA_START) {
            return Err(DiskError::BadGeometry(format!(
                "need blocks {} and {} for the directory and file data",
                INDEX_START, DATA_START
            ))
            .into());
        }
        Ok(())
    }

    fn has_valid_header(&self) -> bool {
        self.disk
            .read(MBR)
            .map(|mbr| mbr.starts_with(MBR_HEADER))
            .unwrap_or(false)
    }
}

impl DeviceDriver for FileSystemDriver {
    /// Format the disk if its MBR is not ours, then load the directory.
    fn driver_entry(&mut self) -> Result<(), KernelError> {
        self.status = "loading".to_string();
        self.check_geometry()?;
        if !self.has_valid_header() {
            log::info!("disk has no valid MBR, formatting");
            self.format()?;
        }
        self.enumerate_files()?;
        self.status = "loaded".to_string();
        Ok(())
    }

    /// The disk raises no interrupts. All file system work is a direct call.
    fn isr(&mut self, params: &[Param], _console: &mut dyn Console) -> Result<(), DriverError> {
        log::debug!("file system driver ignored an interrupt with {} params", params.len());
        Ok(())
    }

    fn status(&self) -> &str {
        &self.status
    }
}

/// Swap pages are ordinary data chains that never appear in the directory.
impl BackingStore for FileSystemDriver {
    fn allocate_page(&mut self) -> Result<Tsb, FsError> {
        let head = self.allocate(false)?.ok_or(FsError::NoSpace)?;
        let zero_page = vec![0u8; Config::PAGE_SIZE];
        if let Err(err) = self.write(head, &zero_page) {
            self.free(head, false)?;
            return Err(err);
        }
        Ok(head)
    }

    fn read_page(&mut self, key: Tsb) -> Result<Vec<u8>, FsError> {
        let mut page = self.read(key)?;
        page.resize(Config::PAGE_SIZE, 0);
        Ok(page)
    }

    fn write_page(&mut self, key: Tsb, data: &[u8]) -> Result<(), FsError> {
        self.write(key, data)
    }

    fn release_page(&mut self, key: Tsb) -> Result<(), FsError> {
        for block in self.chain(key)? {
            self.free(block, false)?;
        }
        Ok(())
    }
}
