use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::disk::{Disk, DiskError, Geometry};
use crate::tsb::Tsb;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("disk image i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("disk image json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("disk image hex in block {key}: {source}")]
    Hex {
        key: String,
        source: hex::FromHexError,
    },
    #[error("disk image has invalid block key {0:?}")]
    BadKey(String),
    #[error(transparent)]
    Disk(#[from] DiskError),
}

/// On-disk JSON form of a `Disk`: the geometry plus every block as an
/// uppercase hex string keyed by its three-digit TSB.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskImage {
    pub geometry: Geometry,
    pub blocks: BTreeMap<String, String>,
}

impl DiskImage {
    pub fn from_disk(disk: &Disk) -> Self {
        let blocks = disk
            .iter()
            .map(|(tsb, data)| (tsb.key(), hex::encode_upper(data)))
            .collect();
        Self {
            geometry: disk.geometry(),
            blocks,
        }
    }

    pub fn into_disk(self) -> Result<Disk, ImageError> {
        let mut saved = BTreeMap::new();
        for (key, value) in self.blocks {
            let tsb = Tsb::from_key(&key).ok_or_else(|| ImageError::BadKey(key.clone()))?;
            let data = hex::decode(&value).map_err(|source| ImageError::Hex { key, source })?;
            saved.insert(tsb, data);
        }
        Ok(Disk::with_blocks(self.geometry, saved)?)
    }

    pub fn to_json(&self) -> Result<String, ImageError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ImageError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save(disk: &Disk, path: &Path) -> Result<(), ImageError> {
        fs::write(path, Self::from_disk(disk).to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Disk, ImageError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)?.into_disk()
    }
}
