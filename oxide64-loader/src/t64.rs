// This file is part of oxide64.
// Licensed under the GPLv3. See LICENSE file in the project root for full license text.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::str;

use byteorder::{LittleEndian, ReadBytesExt};
use oxide64_system::autostart;
use oxide64_system::{Autostart, AutostartMethod, Image, C64};

use super::{invalid_data, Loader};

// SPEC: http://ist.uwaterloo.ca/~schepers/formats/T64.TXT
//
// T64 is a directory of named items with load addresses; the first used
// entry is flashed into memory like a PRG.

static HEADER_SIG: &str = "C64 tape image file";

struct Entry {
    start_address: u16,
    end_address: u16,
    offset: u32,
    name: [u8; 16],
}

struct T64Image {
    data: Vec<u8>,
    offset: u16,
}

impl Image for T64Image {
    fn mount(&mut self, c64: &mut C64) {
        info!(target: "loader", "Mounting T64 image");
        c64.load(&self.data, self.offset);
    }

    fn unmount(&mut self, _c64: &mut C64) {}
}

pub struct T64Loader;

impl T64Loader {
    pub fn new() -> Self {
        Self {}
    }

    fn read_entry(&self, rdr: &mut dyn Read) -> io::Result<Option<Entry>> {
        let entry_type = rdr.read_u8()?;
        let _file_type = rdr.read_u8()?;
        let start_address = rdr.read_u16::<LittleEndian>()?;
        let end_address = rdr.read_u16::<LittleEndian>()?;
        let _unused = rdr.read_u16::<LittleEndian>()?;
        let offset = rdr.read_u32::<LittleEndian>()?;
        let mut unused2 = [0u8; 4];
        rdr.read_exact(&mut unused2)?;
        let mut name = [0u8; 16];
        rdr.read_exact(&mut name)?;
        if entry_type == 0 {
            Ok(None)
        } else {
            Ok(Some(Entry {
                start_address,
                end_address,
                offset,
                name,
            }))
        }
    }
}

impl Loader for T64Loader {
    fn autostart(&self, path: &Path) -> Result<AutostartMethod, io::Error> {
        let image = self.load(path)?;
        let autostart = Autostart::new(autostart::Mode::Run, image);
        Ok(AutostartMethod::WithAutostart(Some(autostart)))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Image>, io::Error> {
        info!(target: "loader", "Loading T64 {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut buffer = Vec::new();
        reader.read_to_end(&mut buffer)?;
        if buffer.len() < 64 {
            return Err(invalid_data("truncated T64 header"));
        }
        let sig = str::from_utf8(&buffer[0..HEADER_SIG.len()])
            .map_err(|_| invalid_data("invalid T64 signature"))?;
        if sig != HEADER_SIG {
            return Err(invalid_data("invalid T64 signature"));
        }
        let max_entries =
            u16::from(buffer[34]) | (u16::from(buffer[35]) << 8);
        let mut cursor: &[u8] = &buffer[64..];
        let mut entry = None;
        for _ in 0..max_entries {
            if let Some(found) = self.read_entry(&mut cursor)? {
                entry = Some(found);
                break;
            }
        }
        let entry = entry.ok_or_else(|| invalid_data("empty T64 directory"))?;
        info!(target: "loader", "Found item {}, 0x{:04x}-0x{:04x}",
              str::from_utf8(&entry.name).unwrap_or("").trim_end(),
              entry.start_address, entry.end_address);
        let length = entry.end_address.wrapping_sub(entry.start_address) as usize;
        let start = entry.offset as usize;
        if start + length > buffer.len() {
            return Err(invalid_data("truncated T64 item"));
        }
        Ok(Box::new(T64Image {
            data: buffer[start..start + length].to_vec(),
            offset: entry.start_address,
        }))
    }
}
