use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::Config;

use crate::tsb::Tsb;

/// Physical layout of the disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geometry {
    pub tracks: u8,
    pub sectors: u8,
    pub blocks: u8,
    pub block_size: usize,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            tracks: Config::DISK_TRACKS,
            sectors: Config::DISK_SECTORS,
            blocks: Config::DISK_BLOCKS,
            block_size: Config::DISK_BLOCK_SIZE,
        }
    }
}

impl Geometry {
    pub fn contains(&self, tsb: Tsb) -> bool {
        tsb.track < self.tracks && tsb.sector < self.sectors && tsb.block < self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.tracks as usize * self.sectors as usize * self.blocks as usize
    }

    /// Reject layouts the pointer encoding or the block format cannot express.
    pub fn validate(&self) -> Result<(), DiskError> {
        let max = Config::DISK_MAX_COORDINATE_COUNT;
        for (name, count) in [
            ("tracks", self.tracks),
            ("sectors", self.sectors),
            ("blocks", self.blocks),
        ] {
            if count == 0 || count > max {
                return Err(DiskError::BadGeometry(format!(
                    "{} must be between 1 and {}, got {}",
                    name, max, count
                )));
            }
        }
        if self.contains(Tsb::INVALID) {
            return Err(DiskError::BadGeometry(format!(
                "address {} is reserved for the invalid pointer",
                Tsb::INVALID
            )));
        }
        if self.block_size < Config::DISK_MIN_BLOCK_SIZE || self.block_size > Config::DISK_MAX_BLOCK_SIZE {
            return Err(DiskError::BadGeometry(format!(
                "block size must be between {} and {}, got {}",
                Config::DISK_MIN_BLOCK_SIZE,
                Config::DISK_MAX_BLOCK_SIZE,
                self.block_size
            )));
        }
        Ok(())
    }

    /// Every address in track-major order.
    pub fn addresses(&self) -> impl Iterator<Item = Tsb> + '_ {
        (0..self.tracks).flat_map(move |t| {
            (0..self.sectors).flat_map(move |s| (0..self.blocks).map(move |b| Tsb::new(t, s, b)))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiskError {
    #[error("bad location {0}")]
    BadLocation(Tsb),
    #[error("bad data write of {len} bytes (block size {block_size})")]
    BadLength { len: usize, block_size: usize },
    #[error("bad geometry: {0}")]
    BadGeometry(String),
}

/// Represents the simulated hard disk.
///
/// EDUCATIONAL PURPOSE: A real disk is addressed by cylinder, head and
/// sector. This model keeps the same idea with three coordinates: track,
/// sector and block. Every block is exactly `block_size` bytes and the disk
/// knows nothing about files; that is the file system driver's job.
///
/// STORAGE CONCEPTS:
/// - Fixed geometry decided at construction
/// - Raw block reads and writes, no caching
/// - Short writes only replace the leading bytes of a block, the rest of
///   the block keeps whatever it held before
///
/// MEMORY MANAGEMENT: Blocks live in a BTreeMap keyed by address so that
/// iteration (for dumps and for saving an image) is always in disk order.
#[derive(Debug, Clone)]
pub struct Disk {
    geometry: Geometry,
    blocks: BTreeMap<Tsb, Vec<u8>>,
}

impl Default for Disk {
    fn default() -> Self {
        Self::new(Geometry::default())
    }
}

impl Disk {
    /// Creates a disk with every block zero-filled.
    pub fn new(geometry: Geometry) -> Self {
        let blocks = geometry
            .addresses()
            .map(|tsb| (tsb, vec![0u8; geometry.block_size]))
            .collect();
        Self { geometry, blocks }
    }

    /// Creates a disk from previously saved block contents. Missing blocks
    /// are zero-filled. The geometry is validated first.
    pub fn with_blocks(geometry: Geometry, saved: BTreeMap<Tsb, Vec<u8>>) -> Result<Self, DiskError> {
        geometry.validate()?;
        let mut disk = Self::new(geometry);
        for (tsb, data) in saved {
            if data.len() != geometry.block_size {
                return Err(DiskError::BadLength {
                    len: data.len(),
                    block_size: geometry.block_size,
                });
            }
            disk.write(tsb, &data)?;
        }
        Ok(disk)
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    pub fn block_size(&self) -> usize {
        self.geometry.block_size
    }

    pub fn read(&self, tsb: Tsb) -> Result<&[u8], DiskError> {
        self.blocks
            .get(&tsb)
            .map(Vec::as_slice)
            .ok_or(DiskError::BadLocation(tsb))
    }

    /// Write `data` at the start of the block. Empty or oversized writes
    /// are rejected and leave the block untouched.
    pub fn write(&mut self, tsb: Tsb, data: &[u8]) -> Result<(), DiskError> {
        let block_size = self.geometry.block_size;
        if data.is_empty() || data.len() > block_size {
            return Err(DiskError::BadLength {
                len: data.len(),
                block_size,
            });
        }
        let block = self.blocks.get_mut(&tsb).ok_or(DiskError::BadLocation(tsb))?;
        block[..data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Zero every block.
    pub fn factory_reset(&mut self) {
        for block in self.blocks.values_mut() {
            block.fill(0);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tsb, &[u8])> {
        self.blocks.iter().map(|(tsb, data)| (*tsb, data.as_slice()))
    }

    pub fn dump(&self) {
        println!("--- Disk Dump ---");
        for (tsb, data) in self.iter() {
            if data.iter().all(|b| *b == 0) {
                continue;
            }
            println!("{} | {}", tsb, hex::encode_upper(data));
        }
        println!("-----------------");
    }
}
