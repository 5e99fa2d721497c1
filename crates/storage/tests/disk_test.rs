use std::collections::BTreeMap;

use storage::{Disk, DiskError, DiskImage, Geometry, ImageError, Tsb};

#[test]
fn test_default_geometry() {
    let disk = Disk::default();
    let geometry = disk.geometry();
    assert_eq!((geometry.tracks, geometry.sectors, geometry.blocks), (4, 8, 8));
    assert_eq!(disk.block_size(), 64);
    assert_eq!(geometry.block_count(), 256);
    assert_eq!(disk.iter().count(), 256);
    assert!(disk.read(Tsb::new(3, 7, 7)).unwrap().iter().all(|b| *b == 0));
    println!("✅ fresh disk has 256 zeroed blocks");
}

#[test]
fn test_short_write_keeps_block_tail() {
    let mut disk = Disk::default();
    let tsb = Tsb::new(1, 2, 3);
    disk.write(tsb, &[0xAA; 64]).unwrap();
    disk.write(tsb, &[0x01, 0x02]).unwrap();

    let block = disk.read(tsb).unwrap();
    assert_eq!(&block[..3], &[0x01, 0x02, 0xAA]);
    assert_eq!(block.len(), 64);
}

#[test]
fn test_bad_writes_are_rejected() {
    let mut disk = Disk::default();
    let tsb = Tsb::new(0, 0, 1);

    assert_eq!(
        disk.write(tsb, &[]),
        Err(DiskError::BadLength { len: 0, block_size: 64 })
    );
    assert_eq!(
        disk.write(tsb, &[0u8; 65]),
        Err(DiskError::BadLength { len: 65, block_size: 64 })
    );
    assert_eq!(
        disk.write(Tsb::new(4, 0, 0), &[1]),
        Err(DiskError::BadLocation(Tsb::new(4, 0, 0)))
    );
    assert!(disk.read(Tsb::INVALID).is_err());
}

#[test]
fn test_tsb_pointer_encoding() {
    let tsb = Tsb::new(1, 0, 7);
    assert_eq!(tsb.to_bytes(), *b"107");
    assert_eq!(Tsb::from_bytes(b"107"), Some(tsb));
    assert_eq!(Tsb::from_bytes(b"1x7"), None);
    assert_eq!(Tsb::from_bytes(b"10"), None);
    assert!(Tsb::from_bytes(b"777").unwrap().is_invalid());
    assert_eq!(tsb.key(), "107");
    assert_eq!(Tsb::from_key("107"), Some(tsb));
    assert_eq!(tsb.to_string(), "1:0:7");
}

#[test]
fn test_addresses_are_track_major() {
    let geometry = Geometry::default();
    let first: Vec<Tsb> = geometry.addresses().take(9).collect();
    assert_eq!(first[0], Tsb::new(0, 0, 0));
    assert_eq!(first[7], Tsb::new(0, 0, 7));
    assert_eq!(first[8], Tsb::new(0, 1, 0));
}

#[test]
fn test_image_json_round_trip() {
    let mut disk = Disk::default();
    disk.write(Tsb::new(0, 0, 0), b"CHARON").unwrap();
    disk.write(Tsb::new(2, 5, 1), &[0xDE, 0xAD, 0xBE]).unwrap();

    let json = DiskImage::from_disk(&disk).to_json().unwrap();
    assert!(json.contains("\"251\""));
    assert!(json.contains("DEADBE"));

    let restored = DiskImage::from_json(&json).unwrap().into_disk().unwrap();
    for (tsb, data) in disk.iter() {
        assert_eq!(restored.read(tsb).unwrap(), data);
    }
    println!("✅ disk image round-tripped through JSON");
}

#[test]
fn test_image_rejects_bad_contents() {
    let mut blocks = BTreeMap::new();
    blocks.insert("9x9".to_string(), "00".repeat(64));
    let image = DiskImage {
        geometry: Geometry::default(),
        blocks,
    };
    assert!(matches!(image.into_disk(), Err(ImageError::BadKey(_))));

    let mut blocks = BTreeMap::new();
    blocks.insert("000".to_string(), "00".repeat(10));
    let image = DiskImage {
        geometry: Geometry::default(),
        blocks,
    };
    assert!(matches!(image.into_disk(), Err(ImageError::Disk(DiskError::BadLength { .. }))));
}

#[test]
fn test_factory_reset_zeroes_everything() {
    let mut disk = Disk::default();
    disk.write(Tsb::new(3, 3, 3), &[9; 64]).unwrap();
    disk.factory_reset();
    assert!(disk.iter().all(|(_, data)| data.iter().all(|b| *b == 0)));
}

fn image_with(geometry: Geometry) -> DiskImage {
    DiskImage {
        geometry,
        blocks: BTreeMap::new(),
    }
}

#[test]
fn test_image_rejects_unusable_geometry() {
    let small_blocks = Geometry {
        block_size: 16,
        ..Geometry::default()
    };
    let huge_blocks = Geometry {
        block_size: 300,
        ..Geometry::default()
    };
    let too_many_tracks = Geometry {
        tracks: 9,
        ..Geometry::default()
    };
    let reaches_invalid = Geometry {
        tracks: 8,
        sectors: 8,
        blocks: 8,
        block_size: 64,
    };
    let no_sectors = Geometry {
        sectors: 0,
        ..Geometry::default()
    };

    for geometry in [small_blocks, huge_blocks, too_many_tracks, reaches_invalid, no_sectors] {
        assert!(geometry.validate().is_err(), "{:?} accepted", geometry);
        assert!(matches!(
            image_with(geometry).into_disk(),
            Err(ImageError::Disk(DiskError::BadGeometry(_)))
        ));
    }

    assert_eq!(Geometry::default().validate(), Ok(()));
    assert!(image_with(Geometry::default()).into_disk().is_ok());
    println!("✅ images with unusable geometry are rejected");
}
