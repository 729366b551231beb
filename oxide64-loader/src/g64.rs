// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::str;

use byteorder::{LittleEndian, ReadBytesExt};
use oxide64_core::drive::Disk;
use oxide64_system::{AutostartMethod, Image, C64};

use super::{invalid_data, Loader};

// SPEC: http://ist.uwaterloo.ca/~schepers/formats/G64.TXT
//
// G64 stores the raw GCR stream per halftrack together with a speed zone
// table, which preserves whatever a copy protection put on the disk.

static HEADER_SIG: &str = "GCR-1541";

struct G64Image {
    disk: Option<Disk>,
}

impl Image for G64Image {
    fn mount(&mut self, c64: &mut C64) {
        info!(target: "loader", "Mounting G64 image");
        if let Some(disk) = self.disk.take() {
            if c64.insert_disk(0, disk).is_err() {
                warn!(target: "loader", "No drive available for G64 image");
            }
        }
    }

    fn unmount(&mut self, c64: &mut C64) {
        let _ = c64.eject_disk(0);
    }
}

pub struct G64Loader;

impl G64Loader {
    pub fn new() -> Self {
        Self {}
    }
}

impl Loader for G64Loader {
    fn autostart(&self, path: &Path) -> Result<AutostartMethod, io::Error> {
        let image = self.load(path)?;
        Ok(AutostartMethod::WithImage(image))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Image>, io::Error> {
        info!(target: "loader", "Loading G64 {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut signature = [0u8; 8];
        reader.read_exact(&mut signature)?;
        let sig = str::from_utf8(&signature).map_err(|_| invalid_data("invalid G64 signature"))?;
        if sig != HEADER_SIG {
            return Err(invalid_data("invalid G64 signature"));
        }
        let version = reader.read_u8()?;
        let track_count = reader.read_u8()? as usize;
        let max_track_size = reader.read_u16::<LittleEndian>()?;
        info!(target: "loader", "Found G64, version {}, {} halftracks, track size {}",
              version, track_count, max_track_size);
        let mut track_offsets = Vec::with_capacity(track_count);
        for _ in 0..track_count {
            track_offsets.push(reader.read_u32::<LittleEndian>()?);
        }
        let mut speed_entries = Vec::with_capacity(track_count);
        for _ in 0..track_count {
            speed_entries.push(reader.read_u32::<LittleEndian>()?);
        }
        let mut disk = Disk::new();
        for (index, &offset) in track_offsets.iter().enumerate() {
            if offset == 0 {
                continue;
            }
            let halftrack = index + 1;
            if halftrack > oxide64_core::drive::NUM_HALFTRACKS {
                break;
            }
            reader.seek(SeekFrom::Start(u64::from(offset)))?;
            let length = reader.read_u16::<LittleEndian>()? as usize;
            let mut bits = vec![0u8; length];
            reader.read_exact(&mut bits)?;
            // speed entries below 4 are a constant zone for the whole track
            let speed = (speed_entries[index] & 0x03) as u8;
            disk.set_halftrack(halftrack, &bits, (length * 8) as u32, speed);
        }
        Ok(Box::new(G64Image { disk: Some(disk) }))
    }
}
