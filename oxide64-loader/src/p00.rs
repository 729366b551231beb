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

static HEADER_SIG: &str = "C64File";

struct Header {
    signature: [u8; 7],
    #[allow(dead_code)]
    filename: [u8; 16],
}

struct P00Image {
    data: Vec<u8>,
    offset: u16,
}

impl Image for P00Image {
    fn mount(&mut self, c64: &mut C64) {
        info!(target: "loader", "Mounting P00 image");
        c64.load(&self.data, self.offset);
    }

    fn unmount(&mut self, _c64: &mut C64) {}
}

pub struct P00Loader;

impl P00Loader {
    pub fn new() -> Self {
        Self {}
    }

    fn read_header(&self, rdr: &mut dyn Read) -> io::Result<Header> {
        let mut signature = [0u8; 7];
        rdr.read_exact(&mut signature)?;
        let _nul = rdr.read_u8()?;
        let mut filename = [0u8; 16];
        rdr.read_exact(&mut filename)?;
        let _reserved_1 = rdr.read_u8()?;
        let _reserved_2 = rdr.read_u8()?;
        Ok(Header {
            signature,
            filename,
        })
    }

    fn validate_header(&self, header: &Header) -> io::Result<()> {
        let sig = str::from_utf8(&header.signature)
            .map_err(|_| invalid_data("invalid P00 signature"))?;
        if sig == HEADER_SIG {
            Ok(())
        } else {
            Err(invalid_data("invalid P00 signature"))
        }
    }
}

impl Loader for P00Loader {
    fn autostart(&self, path: &Path) -> Result<AutostartMethod, io::Error> {
        let image = self.load(path)?;
        let autostart = Autostart::new(autostart::Mode::Run, image);
        Ok(AutostartMethod::WithAutostart(Some(autostart)))
    }

    fn load(&self, path: &Path) -> Result<Box<dyn Image>, io::Error> {
        info!(target: "loader", "Loading P00 {}", path.display());
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let header = self.read_header(&mut reader)?;
        self.validate_header(&header)?;
        let offset = reader.read_u16::<LittleEndian>()?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        info!(target: "loader", "Program offset 0x{:x}, size {}", offset, data.len());
        Ok(Box::new(P00Image { data, offset }))
    }
}
