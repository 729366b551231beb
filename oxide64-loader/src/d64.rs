// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use oxide64_core::drive::Disk;
use oxide64_system::autostart;
use oxide64_system::{Autostart, AutostartMethod, Image, C64};

use super::{invalid_data, Loader};

// SPEC: http://ist.uwaterloo.ca/~schepers/formats/D64.TXT
//
// A D64 is the logical sector dump of a 35 or 40 track disk, optionally
// followed by one error byte per sector. Encoding into the GCR stream is
// lossless, so the image mounts as a faithful disk.

const SECTORS_35: usize = 683;
const SECTORS_40: usize = 768;

fn sectors_in_track(track: usize) -> usize {
    match track {
        1..=17 => 21,
        18..=24 => 19,
        25..=30 => 18,
        _ => 17,
    }
}

fn sector_offset(track: usize, sector: usize) -> usize {
    let mut offset = 0;
    for t in 1..track {
        offset += sectors_in_track(t);
    }
    (offset + sector) * 256
}

struct D64Image {
    disk: Option<Disk>,
}

impl Image for D64Image {
    fn mount(&mut self, c64: &mut C64) {
        info!(target: "loader", "Mounting D64 image");
        if let Some(disk) = self.disk.take() {
            if c64.insert_disk(0, disk).is_err() {
                warn!(target: "loader", "No drive available for D64 image");
            }
        }
    }

    fn unmount(&mut self, c64: &mut C64) {
        let _ = c64.eject_disk(0);
    }
}

pub struct D64Loader;

impl D64Loader {
    pub fn new() -> Self {
        Self {}
    }

    fn build_disk(&self, data: &[u8], num_tracks: usize) -> Disk {
        let mut disk = Disk::new();
        // disk id lives in the BAM sector at track 18, sector 0
        let bam = sector_offset(18, 0);
        let id = (data[bam + 162], data[bam + 163]);
        let sectors = |track: usize, sector: usize| {
            let mut block = [0u8; 256];
            let offset = sector_offset(track, sector);
            block.copy_from_slice(&data[offset..offset + 256]);
            block
        };
        disk.encode(num_tracks, &sectors, id);
        disk
    }
}

impl Loader for D64Loader {
    fn autostart(&self, path: &Path) -> Result<AutostartMethod, io::Error> {
        let image = self.load(path)?;
        let autostart = Autostart::new(autostart::Mode::LoadDisk, image);
        Ok(AutostartMethod::WithAutostart(Some(autostart)))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Image>, io::Error> {
        info!(target: "loader", "Loading D64 {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let num_tracks = match data.len() {
            len if len == SECTORS_35 * 256 => 35,
            len if len == SECTORS_35 * 257 => 35, // with error bytes
            len if len == SECTORS_40 * 256 => 40,
            len if len == SECTORS_40 * 257 => 40,
            _ => return Err(invalid_data("invalid D64 size")),
        };
        info!(target: "loader", "Found disk, {} tracks, {} bytes", num_tracks, data.len());
        let disk = self.build_disk(&data, num_tracks);
        Ok(Box::new(D64Image { disk: Some(disk) }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sector_offsets_follow_speed_zones() {
        assert_eq!(0, sector_offset(1, 0));
        assert_eq!(21 * 256, sector_offset(2, 0));
        assert_eq!(17 * 21 * 256, sector_offset(18, 0));
        assert_eq!(SECTORS_35 * 256, sector_offset(36, 0));
    }

    #[test]
    fn d64_roundtrip_through_gcr() {
        let mut data = vec![0u8; SECTORS_35 * 256];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = (i % 251) as u8;
        }
        let loader = D64Loader::new();
        let disk = loader.build_disk(&data, 35);
        let (decoded, errors) = disk.decode(35).unwrap();
        assert!(errors.iter().all(|e| *e == oxide64_core::drive::DiskError::Ok));
        assert_eq!(data, decoded);
    }
}
