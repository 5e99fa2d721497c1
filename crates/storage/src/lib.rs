//! Simulated hard disk: fixed geometry, raw fixed-size blocks, and a JSON
//! image format for persisting a disk between sessions.

pub mod disk;
pub mod image;
pub mod tsb;

pub use disk::{Disk, DiskError, Geometry};
pub use image::{DiskImage, ImageError};
pub use tsb::Tsb;
